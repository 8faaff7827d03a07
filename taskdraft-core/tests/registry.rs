use std::collections::HashMap;
use std::sync::Arc;
use taskdraft_core::logging::NoopEventLogger;
use taskdraft_core::provider::ProviderConfig;
use taskdraft_core::registry::{
    ProviderCandidate, ProviderFamily, ProviderRegistry, ProviderSettings,
};

fn registry(vars: &[(&str, &str)], settings: &ProviderSettings) -> ProviderRegistry {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ProviderRegistry::from_lookup(|key| env.get(key).cloned(), settings)
}

#[test]
fn nothing_configured_yields_no_candidates() {
    let r = registry(&[], &ProviderSettings::default());
    assert!(r.is_empty());
    assert!(r.list_candidates().is_empty());
    assert!(r.build_providers(Arc::new(NoopEventLogger)).is_empty());
}

#[test]
fn all_markers_in_fixed_order_with_default_models() {
    let r = registry(
        &[
            ("OLLAMA_BASE_URL", "http://localhost:11434"),
            ("COHERE_API_KEY", "c"),
            ("GOOGLE_API_KEY", "g"),
            ("ANTHROPIC_API_KEY", "a"),
            ("OPENAI_API_KEY", "o"),
        ],
        &ProviderSettings::default(),
    );
    assert_eq!(
        r.labels(),
        vec![
            "gpt-3.5-turbo",
            "claude-3-haiku-20240307",
            "gemini/gemini-2.0-flash",
            "command",
            "ollama/llama2",
        ]
    );
    let built = r.build_providers(Arc::new(NoopEventLogger));
    assert_eq!(built.len(), 5);
    assert_eq!(built[2].provider.metadata().name, "GoogleProvider");
    assert_eq!(built[2].provider.metadata().model, "gemini-2.0-flash");
    assert_eq!(built[4].provider.metadata().id, "ollama/llama2");
}

#[test]
fn blank_markers_are_ignored() {
    let r = registry(
        &[("OPENAI_API_KEY", "  "), ("COHERE_API_KEY", "key")],
        &ProviderSettings::default(),
    );
    assert_eq!(r.labels(), vec!["command"]);
}

#[test]
fn settings_override_models_and_enable_ollama() {
    let settings = ProviderSettings {
        openai_model: Some("gpt-4o-mini".to_string()),
        google_model: Some("gemini/gemini-1.5-pro".to_string()),
        ollama_model: Some("mistral".to_string()),
        ollama_base_url: Some("http://gpu-box:11434".to_string()),
        ..ProviderSettings::default()
    };
    let r = registry(
        &[("OPENAI_API_KEY", "o"), ("GOOGLE_API_KEY", "g")],
        &settings,
    );
    assert_eq!(
        r.labels(),
        vec!["gpt-4o-mini", "gemini/gemini-1.5-pro", "ollama/mistral"]
    );
    let ollama = r
        .configs()
        .into_iter()
        .find(|c| matches!(c, ProviderConfig::Ollama { .. }))
        .unwrap();
    match ollama {
        ProviderConfig::Ollama { base_url, model, .. } => {
            assert_eq!(base_url, "http://gpu-box:11434");
            assert_eq!(model, "mistral");
        }
        _ => unreachable!(),
    }
}

#[test]
fn env_ollama_url_takes_precedence_over_settings() {
    let settings = ProviderSettings {
        ollama_base_url: Some("http://from-file:11434".to_string()),
        ..ProviderSettings::default()
    };
    let r = registry(&[("OLLAMA_BASE_URL", "http://from-env:11434")], &settings);
    match &r.configs()[0] {
        ProviderConfig::Ollama { base_url, .. } => assert_eq!(base_url, "http://from-env:11434"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn candidate_labels_follow_family_prefix() {
    assert_eq!(
        ProviderCandidate::new(ProviderFamily::Ollama, "ollama/llama2").label(),
        "ollama/llama2"
    );
    assert_eq!(
        ProviderCandidate::new(ProviderFamily::Ollama, "llama2").model,
        "llama2"
    );
    assert_eq!(
        ProviderCandidate::new(ProviderFamily::Cohere, "command").to_string(),
        "command"
    );
}
