//! In-process engine: hierarchy shape, renewal and key handling

use certchain_signing::{
    CertificateInfo, CertificateRequest, CertificateRole, Expiry, IssuedCertificate,
    IssuerMaterial, KeySpec, LocalEngine, RenewalOverrides, RenewalRequest, SigningEngine,
    SigningError, SubjectName, Usage, verify_issued_by,
};

fn request(common_name: &str, hours: u64) -> CertificateRequest {
    let mut request = CertificateRequest::new(common_name, Expiry::from_hours(hours));
    request.key = KeySpec::ecdsa(256);
    request
}

fn issuer(issued: &IssuedCertificate) -> IssuerMaterial {
    IssuerMaterial {
        certificate: issued.certificate.clone(),
        key: issued.key.clone(),
    }
}

async fn hierarchy(engine: &LocalEngine) -> (IssuedCertificate, IssuedCertificate) {
    let root = engine.create_root(&request("RootCA", 87_600)).await.unwrap();
    let intermediate = engine
        .create_intermediate(&request("IntermediateCA", 43_800), &issuer(&root))
        .await
        .unwrap();
    (root, intermediate)
}

#[tokio::test]
async fn test_root_is_self_signed_with_default_rsa_key() {
    let engine = LocalEngine::new();
    let mut req = CertificateRequest::new("RootCA", Expiry::from_hours(87_600));
    req.subject = Some(SubjectName {
        country: Some("US".to_string()),
        organization: Some("Example".to_string()),
        ..SubjectName::default()
    });
    let root = engine.create_root(&req).await.unwrap();

    let info = CertificateInfo::from_artifact(&root.certificate).unwrap();
    assert_eq!(info.common_name, "RootCA");
    assert_eq!(info.issuer_common_name, "RootCA");
    assert_eq!(info.subject.country.as_deref(), Some("US"));
    assert_eq!(info.subject.organization.as_deref(), Some("Example"));
    assert_eq!(info.key_algorithm, "rsa");
    assert_eq!(info.key_bits, 2048);
    assert!(info.is_ca);
    assert_eq!(info.path_len, Some(1));
    assert!(info.usages.contains(&Usage::CertSign));
    assert_eq!(info.lifetime().as_secs(), 87_600 * 3_600);
    assert!(root.csr.is_none());

    verify_issued_by(&root.certificate, &root.certificate).unwrap();
}

#[tokio::test]
async fn test_intermediate_is_signed_by_root() {
    let engine = LocalEngine::new();
    let (root, intermediate) = hierarchy(&engine).await;

    let info = CertificateInfo::from_artifact(&intermediate.certificate).unwrap();
    assert_eq!(info.common_name, "IntermediateCA");
    assert_eq!(info.issuer_common_name, "RootCA");
    assert!(info.is_ca);
    assert_eq!(info.path_len, Some(0));
    assert!(info.hosts.is_empty());
    assert!(intermediate.csr.is_some());

    verify_issued_by(&intermediate.certificate, &root.certificate).unwrap();
    assert!(verify_issued_by(&intermediate.certificate, &intermediate.certificate).is_err());
}

#[tokio::test]
async fn test_leaf_carries_hosts_and_default_usages() {
    let engine = LocalEngine::new();
    let (_, intermediate) = hierarchy(&engine).await;

    let mut req = request("web", 8_760);
    req.hosts = vec!["web.internal".to_string(), "10.0.0.7".to_string()];
    let leaf = engine.create_leaf(&req, &issuer(&intermediate)).await.unwrap();

    let info = CertificateInfo::from_artifact(&leaf.certificate).unwrap();
    assert_eq!(info.common_name, "web");
    assert_eq!(info.issuer_common_name, "IntermediateCA");
    assert!(!info.is_ca);
    assert_eq!(info.hosts, vec!["web.internal", "10.0.0.7"]);
    assert!(info.usages.contains(&Usage::DigitalSignature));
    assert!(info.usages.contains(&Usage::KeyEncipherment));
    assert!(info.usages.contains(&Usage::ServerAuth));
    assert!(info.usages.contains(&Usage::ClientAuth));

    verify_issued_by(&leaf.certificate, &intermediate.certificate).unwrap();
}

#[tokio::test]
async fn test_leaf_honours_requested_usages() {
    let engine = LocalEngine::new();
    let (_, intermediate) = hierarchy(&engine).await;

    let mut req = request("signer", 24);
    req.usages = vec![Usage::DigitalSignature, Usage::CodeSigning];
    let leaf = engine.create_leaf(&req, &issuer(&intermediate)).await.unwrap();

    let info = CertificateInfo::from_artifact(&leaf.certificate).unwrap();
    assert!(info.usages.contains(&Usage::CodeSigning));
    assert!(!info.usages.contains(&Usage::ServerAuth));
}

#[tokio::test]
async fn test_renew_root_keeps_key_and_subject() {
    let engine = LocalEngine::new();
    let root = engine.create_root(&request("RootCA", 87_600)).await.unwrap();
    let before = CertificateInfo::from_artifact(&root.certificate).unwrap();

    let renewed = engine
        .renew(&RenewalRequest {
            role: CertificateRole::Root,
            certificate: root.certificate.clone(),
            key: root.key.clone(),
            issuer: None,
            overrides: RenewalOverrides::default(),
        })
        .await
        .unwrap();

    assert_ne!(renewed.as_bytes(), root.certificate.as_bytes());
    let after = CertificateInfo::from_artifact(&renewed).unwrap();
    assert_eq!(after.common_name, before.common_name);
    assert_eq!(after.path_len, Some(1));
    assert_ne!(after.serial, before.serial);
    assert_eq!(after.lifetime(), before.lifetime());

    // Same key: the renewed root verifies the old one's signature and itself
    verify_issued_by(&renewed, &renewed).unwrap();
    verify_issued_by(&root.certificate, &renewed).unwrap();
}

#[tokio::test]
async fn test_renew_intermediate_applies_expiry_override() {
    let engine = LocalEngine::new();
    let (root, intermediate) = hierarchy(&engine).await;

    let renewed = engine
        .renew(&RenewalRequest {
            role: CertificateRole::Intermediate,
            certificate: intermediate.certificate.clone(),
            key: intermediate.key.clone(),
            issuer: Some(issuer(&root)),
            overrides: RenewalOverrides {
                expiry: Some(Expiry::from_hours(100)),
                ..RenewalOverrides::default()
            },
        })
        .await
        .unwrap();

    let info = CertificateInfo::from_artifact(&renewed).unwrap();
    assert_eq!(info.common_name, "IntermediateCA");
    assert_eq!(info.lifetime().as_secs(), 100 * 3_600);
    assert_eq!(info.path_len, Some(0));
    verify_issued_by(&renewed, &root.certificate).unwrap();
}

#[tokio::test]
async fn test_renew_leaf_keeps_usages_unless_overridden() {
    let engine = LocalEngine::new();
    let (_, intermediate) = hierarchy(&engine).await;
    let mut req = request("web", 8_760);
    req.hosts = vec!["web.internal".to_string()];
    req.usages = vec![Usage::DigitalSignature, Usage::ServerAuth];
    let leaf = engine.create_leaf(&req, &issuer(&intermediate)).await.unwrap();

    let renewal = |overrides| RenewalRequest {
        role: CertificateRole::Leaf,
        certificate: leaf.certificate.clone(),
        key: leaf.key.clone(),
        issuer: Some(issuer(&intermediate)),
        overrides,
    };

    let kept = engine.renew(&renewal(RenewalOverrides::default())).await.unwrap();
    let kept = CertificateInfo::from_artifact(&kept).unwrap();
    assert!(kept.usages.contains(&Usage::ServerAuth));
    assert!(!kept.usages.contains(&Usage::ClientAuth));
    assert_eq!(kept.hosts, vec!["web.internal"]);

    let changed = engine
        .renew(&renewal(RenewalOverrides {
            usages: Some(vec![Usage::ClientAuth]),
            hosts: Some(vec!["api.internal".to_string()]),
            ..RenewalOverrides::default()
        }))
        .await
        .unwrap();
    verify_issued_by(&changed, &intermediate.certificate).unwrap();
    let changed = CertificateInfo::from_artifact(&changed).unwrap();
    assert!(changed.usages.contains(&Usage::ClientAuth));
    assert!(!changed.usages.contains(&Usage::ServerAuth));
    assert_eq!(changed.hosts, vec!["api.internal"]);
}

#[tokio::test]
async fn test_renew_rebuilds_subject_and_sans_from_certificate() {
    let engine = LocalEngine::new();
    let (_, intermediate) = hierarchy(&engine).await;
    let mut req = request("web", 8_760);
    req.subject = Some(SubjectName {
        country: Some("DE".to_string()),
        organization: Some("Example".to_string()),
        organizational_unit: Some("Platform".to_string()),
        ..SubjectName::default()
    });
    req.hosts = vec!["web.internal".to_string(), "10.0.0.7".to_string()];
    let leaf = engine.create_leaf(&req, &issuer(&intermediate)).await.unwrap();
    let before = CertificateInfo::from_artifact(&leaf.certificate).unwrap();

    let renewed = engine
        .renew(&RenewalRequest {
            role: CertificateRole::Leaf,
            certificate: leaf.certificate.clone(),
            key: leaf.key.clone(),
            issuer: Some(issuer(&intermediate)),
            overrides: RenewalOverrides::default(),
        })
        .await
        .unwrap();

    let after = CertificateInfo::from_artifact(&renewed).unwrap();
    assert_eq!(after.common_name, "web");
    assert_eq!(after.subject, before.subject);
    assert_eq!(after.hosts, vec!["web.internal", "10.0.0.7"]);
    assert_eq!(after.usages, before.usages);
    assert_eq!(after.issuer_common_name, "IntermediateCA");
    assert!(!after.is_ca);
    assert_eq!(after.lifetime(), before.lifetime());
    verify_issued_by(&renewed, &intermediate.certificate).unwrap();
}

#[tokio::test]
async fn test_renew_without_issuer_is_rejected_below_root() {
    let engine = LocalEngine::new();
    let (_, intermediate) = hierarchy(&engine).await;

    let err = engine
        .renew(&RenewalRequest {
            role: CertificateRole::Intermediate,
            certificate: intermediate.certificate.clone(),
            key: intermediate.key.clone(),
            issuer: None,
            overrides: RenewalOverrides::default(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_invalid_key_spec_is_rejected() {
    let engine = LocalEngine::new();
    let mut req = request("RootCA", 1);
    req.key = KeySpec::rsa(1024);
    let err = engine.create_root(&req).await.unwrap_err();
    assert!(matches!(err, SigningError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_p521_is_unsupported_in_process() {
    let engine = LocalEngine::new();
    let mut req = request("RootCA", 1);
    req.key = KeySpec::ecdsa(521);
    let err = engine.create_root(&req).await.unwrap_err();
    assert!(matches!(err, SigningError::Unsupported { engine: "local", .. }));
}

#[tokio::test]
async fn test_p384_keys_are_generated() {
    let engine = LocalEngine::new();
    let mut req = request("RootCA", 1);
    req.key = KeySpec::ecdsa(384);
    let root = engine.create_root(&req).await.unwrap();
    let info = CertificateInfo::from_artifact(&root.certificate).unwrap();
    assert_eq!(info.key_algorithm, "ecdsa");
    assert_eq!(info.key_bits, 384);
}
