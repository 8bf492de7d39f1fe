//! Integration tests for the claim mapper.

use claim_mapper::config::ConfigError;
use claim_mapper::rule::{CaseFold, Mapping};
use claim_mapper::{
    MappedJsonPath, MapperConfig, MapperError, PathError, Principal, PrincipalMapper, Resolution,
    RuleError,
};
use serde_json::json;

// =============================================================================
// Rule Scenarios
// =============================================================================

#[test]
fn test_subject_claim() {
    let rule = MappedJsonPath::new("$.sub").unwrap();
    assert_eq!(rule.eval(&json!({"sub": "user", "other": "value"})), vec!["user"]);
}

#[test]
fn test_email_local_part_lowercased() {
    let rule = MappedJsonPath::new("$.user_info.email/([^@]+)@.*/$1/L").unwrap();
    assert_eq!(
        rule.eval(&json!({"user_info": {"email": "USER@Example.com"}})),
        vec!["user"]
    );
}

#[test]
fn test_wildcard_with_mapping() {
    let rule = MappedJsonPath::new("$.emails[*]/([^@]+)@.*/$1").unwrap();
    assert_eq!(
        rule.eval(&json!({"emails": ["a@x.com", "b@y.com"]})),
        vec!["a", "b"]
    );
}

#[test]
fn test_non_string_dropped() {
    let rule = MappedJsonPath::new("$.age").unwrap();
    assert!(rule.eval(&json!({"age": 30})).is_empty());
}

#[test]
fn test_missing_prefix_rejected() {
    let err = MappedJsonPath::new("regex/replacement").unwrap_err();
    assert!(err.to_string().contains("must start with"));
}

#[test]
fn test_unknown_flag_rejected() {
    let err = Mapping::parse("/regex/replacement/X").unwrap_err();
    assert!(matches!(err, RuleError::UnknownFlag(_)));
    assert!(err.to_string().contains("unknown flag"));
}

// =============================================================================
// Rule Properties
// =============================================================================

#[test]
fn test_rule_text_round_trip() {
    let rules = [
        "$.sub",
        "$[\"preferred_username\"]",
        "$.groups[*]/^team-(.*)$/$1/U",
        r"$['https:\/\/example.com\/roles'][0]",
        "$..email/(?i)^[^@]+@corp\\.com$/$0/L",
    ];
    let doc = json!({
        "sub": "s",
        "preferred_username": "pu",
        "groups": ["team-a", "b"],
        "https://example.com/roles": ["admin"],
        "profile": {"email": "Bob@CORP.com"}
    });

    for text in rules {
        let rule = MappedJsonPath::new(text).unwrap();
        let reparsed = MappedJsonPath::from_bytes(rule.as_bytes()).unwrap();
        assert_eq!(reparsed.as_str(), text);
        assert_eq!(reparsed.eval(&doc), rule.eval(&doc), "{text}");
    }
}

#[test]
fn test_escaped_slash_is_literal() {
    let rule = MappedJsonPath::new(r"$.path/^\/api\/(.*)$/$1").unwrap();
    let mapping = rule.mapping().unwrap();
    assert_eq!(mapping.pattern().as_str(), "^/api/(.*)$");
    assert_eq!(rule.eval(&json!({"path": "/api/users"})), vec!["users"]);
}

#[test]
fn test_regex_is_a_filter() {
    let rule = MappedJsonPath::new("$.groups[*]/^team-(.*)$/$1").unwrap();
    assert_eq!(
        rule.eval(&json!({"groups": ["team-eng", "everyone", "team-ops"]})),
        vec!["eng", "ops"]
    );
}

#[test]
fn test_case_flags() {
    let lower = MappedJsonPath::new("$.name/^.*$/$0/L").unwrap();
    let upper = MappedJsonPath::new("$.name/^.*$/$0/U").unwrap();
    let doc = json!({"name": "MiXeD"});

    assert_eq!(lower.eval(&doc), vec!["mixed"]);
    assert_eq!(upper.eval(&doc), vec!["MIXED"]);
    assert_eq!(lower.mapping().unwrap().case(), CaseFold::Lower);
}

#[test]
fn test_concurrent_evaluation() {
    let rule = MappedJsonPath::new("$.emails[*]/([^@]+)@.*/$1/U").unwrap();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let rule = &rule;
            scope.spawn(move || {
                let doc = json!({"emails": [format!("user{i}@example.com")]});
                assert_eq!(rule.eval(&doc), vec![format!("USER{i}")]);
            });
        }
    });
}

#[test]
fn test_extreme_slice_steps_do_not_panic() {
    let doc = json!({"a": ["x", "y", "z"]});
    let rule = MappedJsonPath::new("$.a[1::9223372036854775807]").unwrap();
    assert_eq!(rule.eval(&doc), vec!["y"]);

    let rule = MappedJsonPath::new("$.a[::-9223372036854775808]").unwrap();
    assert_eq!(rule.eval(&doc), vec!["z"]);
}

#[test]
fn test_deeply_nested_filter_rejected() {
    let rule = format!("$.a[?{}@.b]", "!".repeat(200_000));
    let err = MappedJsonPath::new(rule).unwrap_err();
    assert!(matches!(
        err,
        RuleError::InvalidPath {
            source: PathError::TooDeep { .. },
            ..
        }
    ));
}

// =============================================================================
// Configuration Parsing Tests
// =============================================================================

#[test]
fn test_parse_minimal_config() {
    let config = MapperConfig::from_yaml("version: \"1\"\nmappings: []\n").unwrap();
    assert_eq!(config.version, "1");
    assert!(config.mappings.is_empty());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
version: "1"
settings:
  default_principal: "anonymous"
  require_unique: true

mappings:
  - name: "email"
    description: "Email local part"
    enabled: true
    priority: 100
    rule: "$.email/([^@]+)@.*/$1/L"
  - name: "corp-username"
    priority: 75
    rule: '$["https:\/\/corp.example.com\/username"]'
"#;
    let config = MapperConfig::from_yaml(yaml).unwrap();
    assert_eq!(
        config.settings.default_principal.as_deref(),
        Some("anonymous")
    );
    assert!(config.settings.require_unique);
    assert_eq!(config.mappings.len(), 2);
    assert_eq!(config.mappings[0].description, "Email local part");
    assert_eq!(
        config.mappings[1].rule.as_str(),
        r#"$["https:\/\/corp.example.com\/username"]"#
    );
}

#[test]
fn test_parse_json_config() {
    let json_str = r#"{
        "version": "1",
        "mappings": [
            {
                "name": "json-rule",
                "priority": 5,
                "rule": "$.identities[?(@.provider == 'corp')].user_id"
            }
        ]
    }"#;
    let config = MapperConfig::from_json(json_str).unwrap();
    assert_eq!(config.mappings.len(), 1);
    assert_eq!(config.mappings[0].name, "json-rule");
    assert!(config.mappings[0].enabled);
}

#[test]
fn test_invalid_rules_fail_config_load() {
    for rule in ["sub", "$.sub/a", "$.sub/a/b/X", "$.sub/(/x", "$.items["] {
        let yaml = format!("mappings:\n  - name: bad\n    rule: '{rule}'\n");
        assert!(
            matches!(MapperConfig::from_yaml(&yaml), Err(ConfigError::Yaml(_))),
            "{rule} should be rejected"
        );
    }
}

// =============================================================================
// Principal Resolution Tests
// =============================================================================

const OIDC_CONFIG: &str = r#"
version: "1"
mappings:
  - name: "corp-identity"
    priority: 100
    rule: "$.identities[?(@.provider == 'corp')].user_id/^(.*)$/corp:$1"
  - name: "email"
    priority: 50
    rule: "$.email/([^@]+)@example\\.com$/$1/L"
  - name: "subject"
    priority: 10
    rule: "$.sub"
"#;

#[test]
fn test_resolution_prefers_highest_priority() {
    let mapper = PrincipalMapper::from_yaml(OIDC_CONFIG).unwrap();
    let claims = json!({
        "sub": "f81d4fae",
        "email": "Jane@example.com",
        "identities": [
            {"provider": "github", "user_id": "gh-9"},
            {"provider": "corp", "user_id": "jdoe"}
        ]
    });

    assert_eq!(
        mapper.resolve(&claims),
        Some(Resolution {
            mapping: "corp-identity".to_string(),
            values: vec!["corp:jdoe".to_string()],
        })
    );
}

#[test]
fn test_resolution_falls_through_filtered_rules() {
    let mapper = PrincipalMapper::from_yaml(OIDC_CONFIG).unwrap();

    // Email outside the expected domain is filtered out by the regex.
    let claims = json!({"sub": "f81d4fae", "email": "jane@other.org"});
    assert_eq!(mapper.principal(&claims).unwrap(), "f81d4fae");

    let claims = json!({"sub": "f81d4fae", "email": "JANE@example.com"});
    assert_eq!(
        mapper.identify(&claims).unwrap(),
        Principal {
            name: "jane".to_string(),
            mapping: Some("email".to_string()),
        }
    );
}

#[test]
fn test_unresolved_principal() {
    let mapper = PrincipalMapper::from_yaml(OIDC_CONFIG).unwrap();
    assert!(matches!(
        mapper.principal(&json!({"aud": "kafka"})),
        Err(MapperError::NoPrincipal)
    ));

    let stats = mapper.stats();
    assert_eq!(stats.evaluations, 1);
    assert_eq!(stats.failures, 1);
}

#[test]
fn test_default_mapper_has_no_mappings() {
    let mapper = PrincipalMapper::new(MapperConfig::default()).unwrap();
    assert_eq!(mapper.mapping_names().count(), 0);
    assert!(mapper.resolve(&json!({"sub": "x"})).is_none());
}
