mod support;

use nova_core::error::StageError;
use nova_core::services::ServiceError;
use nova_core::stages::resolve::resolve;
use nova_core::types::ResolutionConfidence;

use support::{resolver_match, FailingResolver, StaticResolver};

#[tokio::test]
async fn resolves_single_match() {
    let resolver = StaticResolver::new(vec![resolver_match("V1324 Sco", 270.1, -32.8)]);
    let resolved = resolve(&resolver, "v1324 sco").await.expect("resolved");

    assert_eq!(resolved.canonical_name, "V1324 Sco");
    assert_eq!(resolved.name_norm, "v1324sco");
    assert_eq!(resolved.confidence, ResolutionConfidence::Unique);
    let coords = resolved.coords.expect("coords");
    assert!((coords.ra_deg - 270.1).abs() < 1e-9);
    assert!((coords.dec_deg + 32.8).abs() < 1e-9);
    // canonical name first, input appended last (here identical, so one entry)
    assert_eq!(resolved.aliases, vec!["V1324 Sco"]);
}

#[tokio::test]
async fn exact_name_match_wins_among_multiple() {
    let resolver = StaticResolver::new(vec![
        resolver_match("V1324 Sgr", 271.0, -33.0),
        resolver_match("V1324 Sco", 270.1, -32.8),
    ]);
    let resolved = resolve(&resolver, "V1324 SCO").await.expect("resolved");
    assert_eq!(resolved.canonical_name, "V1324 Sco");
    assert_eq!(resolved.confidence, ResolutionConfidence::Unique);
}

#[tokio::test]
async fn multiple_matches_without_exact_name_are_ambiguous() {
    let resolver = StaticResolver::new(vec![
        resolver_match("V1324 Sgr", 271.0, -33.0),
        resolver_match("V1324 Oph", 260.0, -20.0),
    ]);
    let resolved = resolve(&resolver, "V1324").await.expect("resolved");
    assert_eq!(
        resolved.confidence,
        ResolutionConfidence::Ambiguous { matches: 2 }
    );
}

#[tokio::test]
async fn zero_matches_is_not_found() {
    let resolver = StaticResolver::new(Vec::new());
    let err = resolve(&resolver, "Nova Fake 2020").await.unwrap_err();
    assert!(matches!(err, StageError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn blank_name_is_permanent() {
    let resolver = StaticResolver::new(Vec::new());
    let err = resolve(&resolver, "   ").await.unwrap_err();
    assert!(matches!(err, StageError::Permanent(_)), "got {err:?}");
    // rejected before any lookup
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn transient_service_error_stays_transient() {
    let resolver = FailingResolver::new(ServiceError::Transient("503".to_string()));
    let err = resolve(&resolver, "V1324 Sco").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn protocol_error_becomes_permanent() {
    let resolver = FailingResolver::new(ServiceError::Protocol("bad shape".to_string()));
    let err = resolve(&resolver, "V1324 Sco").await.unwrap_err();
    assert!(matches!(err, StageError::Permanent(_)), "got {err:?}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn missing_coordinates_stay_explicitly_unresolved() {
    let mut m = resolver_match("V606 Aql", 0.0, 0.0);
    m.ra_deg = None;
    m.dec_deg = Some(-0.5);
    let resolver = StaticResolver::new(vec![m]);
    let resolved = resolve(&resolver, "V606 Aql").await.expect("resolved");
    assert!(resolved.coords.is_none());
}

#[tokio::test]
async fn aliases_and_cross_identifiers_come_from_raw_ids() {
    let mut m = resolver_match("V1324 Sco", 270.1, -32.8);
    m.identifiers = vec![
        "V* V1324 Sco".to_string(),
        "Gaia DR3 4056440101596201600".to_string(),
        "2MASS J18005023-3246446".to_string(),
        "V* V1324 Sco".to_string(), // duplicate
    ];
    let resolver = StaticResolver::new(vec![m]);
    let resolved = resolve(&resolver, "Nova Sco 2012").await.expect("resolved");

    assert_eq!(
        resolved.aliases,
        vec![
            "V1324 Sco",
            "V* V1324 Sco",
            "Gaia DR3 4056440101596201600",
            "2MASS J18005023-3246446",
            "Nova Sco 2012",
        ]
    );
    assert_eq!(
        resolved.cross_identifiers.get("Gaia").map(String::as_str),
        Some("DR3 4056440101596201600")
    );
    assert_eq!(
        resolved.cross_identifiers.get("2MASS").map(String::as_str),
        Some("J18005023-3246446")
    );
}
