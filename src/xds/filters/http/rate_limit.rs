//! Global rate limit action helpers
//!
//! Descriptor specs compile into the `rate_limits` action lists Envoy sends to
//! an external rate limit service. Route-level specs attach to the route
//! action; policy-level specs attach to the virtual host. Both are emitted
//! independently and the proxy evaluates both.

use crate::domain::{DescriptorEntry, GlobalRateLimitSpec, HeaderMatcherSpec, HeaderPredicate};
use envoy_types::pb::envoy::config::route::v3::header_matcher::HeaderMatchSpecifier;
use envoy_types::pb::envoy::config::route::v3::rate_limit::action::{
    ActionSpecifier, GenericKey, HeaderValueMatch, RemoteAddress, RequestHeaders,
};
use envoy_types::pb::envoy::config::route::v3::rate_limit::Action;
use envoy_types::pb::envoy::config::route::v3::{HeaderMatcher, RateLimit};
use envoy_types::pb::envoy::r#type::matcher::v3::{string_matcher::MatchPattern, StringMatcher};
use envoy_types::pb::google::protobuf::BoolValue;

use crate::xds::route::safe_regex;

/// One `RateLimit` per descriptor, with actions in entry order.
pub fn rate_limits(spec: &GlobalRateLimitSpec) -> Vec<RateLimit> {
    spec.descriptors
        .iter()
        .map(|descriptor| RateLimit {
            actions: descriptor.entries.iter().map(rate_limit_action).collect(),
            ..Default::default()
        })
        .collect()
}

/// Rate limits for an optional spec; absent specs produce none
pub fn optional_rate_limits(spec: Option<&GlobalRateLimitSpec>) -> Vec<RateLimit> {
    spec.map(rate_limits).unwrap_or_default()
}

fn rate_limit_action(entry: &DescriptorEntry) -> Action {
    let action_specifier = match entry {
        DescriptorEntry::GenericKey { key, value } => ActionSpecifier::GenericKey(GenericKey {
            descriptor_key: key.clone(),
            descriptor_value: value.clone(),
            ..Default::default()
        }),
        DescriptorEntry::RemoteAddress => ActionSpecifier::RemoteAddress(RemoteAddress {}),
        DescriptorEntry::RequestHeader { name, key } => {
            ActionSpecifier::RequestHeaders(RequestHeaders {
                header_name: name.clone(),
                descriptor_key: key.clone(),
                ..Default::default()
            })
        }
        DescriptorEntry::HeaderValueMatch { key, value, headers, expect_match } => {
            ActionSpecifier::HeaderValueMatch(HeaderValueMatch {
                descriptor_key: key.clone().unwrap_or_default(),
                descriptor_value: value.clone(),
                expect_match: expect_match.map(|value| BoolValue { value }),
                headers: header_matchers(headers),
                ..Default::default()
            })
        }
    };

    Action { action_specifier: Some(action_specifier) }
}

/// Convert header matcher specs, one predicate per header
pub fn header_matchers(headers: &[HeaderMatcherSpec]) -> Vec<HeaderMatcher> {
    headers.iter().map(header_matcher).collect()
}

fn header_matcher(spec: &HeaderMatcherSpec) -> HeaderMatcher {
    let string_match = |pattern: MatchPattern| {
        HeaderMatchSpecifier::StringMatch(StringMatcher {
            match_pattern: Some(pattern),
            ignore_case: false,
        })
    };

    let specifier = match &spec.predicate {
        HeaderPredicate::Exact(value) => string_match(MatchPattern::Exact(value.clone())),
        HeaderPredicate::Prefix(value) => string_match(MatchPattern::Prefix(value.clone())),
        HeaderPredicate::Suffix(value) => string_match(MatchPattern::Suffix(value.clone())),
        HeaderPredicate::Regex(value) => string_match(MatchPattern::SafeRegex(safe_regex(value))),
        HeaderPredicate::Contains(value) => string_match(MatchPattern::Contains(value.clone())),
        HeaderPredicate::Present(present) => HeaderMatchSpecifier::PresentMatch(*present),
    };

    HeaderMatcher {
        name: spec.name.clone(),
        header_match_specifier: Some(specifier),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RateLimitDescriptor;

    #[test]
    fn descriptor_entries_map_to_actions_in_order() {
        let spec = GlobalRateLimitSpec {
            descriptors: vec![
                RateLimitDescriptor {
                    entries: vec![
                        DescriptorEntry::GenericKey {
                            key: "service".into(),
                            value: "books".into(),
                        },
                        DescriptorEntry::RemoteAddress,
                        DescriptorEntry::RequestHeader {
                            name: "x-user".into(),
                            key: "user".into(),
                        },
                    ],
                },
                RateLimitDescriptor {
                    entries: vec![DescriptorEntry::HeaderValueMatch {
                        key: Some("role".into()),
                        value: "admin".into(),
                        headers: vec![HeaderMatcherSpec::new(
                            "x-role",
                            HeaderPredicate::Exact("admin".into()),
                        )],
                        expect_match: Some(false),
                    }],
                },
            ],
        };

        let limits = rate_limits(&spec);
        assert_eq!(limits.len(), 2);
        assert_eq!(limits[0].actions.len(), 3);

        match &limits[0].actions[0].action_specifier {
            Some(ActionSpecifier::GenericKey(key)) => {
                assert_eq!(key.descriptor_key, "service");
                assert_eq!(key.descriptor_value, "books");
            }
            other => panic!("expected generic key, got {other:?}"),
        }
        assert!(matches!(
            limits[0].actions[1].action_specifier,
            Some(ActionSpecifier::RemoteAddress(_))
        ));
        match &limits[0].actions[2].action_specifier {
            Some(ActionSpecifier::RequestHeaders(headers)) => {
                assert_eq!(headers.header_name, "x-user");
                assert_eq!(headers.descriptor_key, "user");
            }
            other => panic!("expected request headers, got {other:?}"),
        }
        match &limits[1].actions[0].action_specifier {
            Some(ActionSpecifier::HeaderValueMatch(matcher)) => {
                assert_eq!(matcher.descriptor_key, "role");
                assert_eq!(matcher.descriptor_value, "admin");
                assert_eq!(matcher.expect_match, Some(BoolValue { value: false }));
                assert_eq!(matcher.headers.len(), 1);
            }
            other => panic!("expected header value match, got {other:?}"),
        }
    }

    #[test]
    fn header_predicates_are_exclusive() {
        let matchers = header_matchers(&[
            HeaderMatcherSpec::new("a", HeaderPredicate::Prefix("pre".into())),
            HeaderMatcherSpec::new("b", HeaderPredicate::Suffix("suf".into())),
            HeaderMatcherSpec::new("c", HeaderPredicate::Regex("^v[0-9]$".into())),
            HeaderMatcherSpec::new("d", HeaderPredicate::Contains("mid".into())),
            HeaderMatcherSpec::new("e", HeaderPredicate::Present(true)),
        ]);

        let pattern = |matcher: &HeaderMatcher| match &matcher.header_match_specifier {
            Some(HeaderMatchSpecifier::StringMatch(string)) => string.match_pattern.clone(),
            other => panic!("expected string match, got {other:?}"),
        };

        assert_eq!(pattern(&matchers[0]), Some(MatchPattern::Prefix("pre".into())));
        assert_eq!(pattern(&matchers[1]), Some(MatchPattern::Suffix("suf".into())));
        assert!(matches!(
            pattern(&matchers[2]),
            Some(MatchPattern::SafeRegex(ref r))
                if r.regex == "^v[0-9]$" && r.engine_type.is_some()
        ));
        assert_eq!(pattern(&matchers[3]), Some(MatchPattern::Contains("mid".into())));
        assert_eq!(
            matchers[4].header_match_specifier,
            Some(HeaderMatchSpecifier::PresentMatch(true))
        );
    }

    #[test]
    fn absent_spec_has_no_rate_limits() {
        assert!(optional_rate_limits(None).is_empty());
        assert!(rate_limits(&GlobalRateLimitSpec::default()).is_empty());
    }
}
