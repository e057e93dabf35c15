//! NXDOMAIN and NODATA answers proven with NSEC and NSEC3.

mod common;

use common::*;
use heimdall_dnssec::config::ValidatorConfig;
use heimdall_dnssec::dns::{NegativeEntry, NegativeKind, RecordType, ResponseCode, Trust};
use heimdall_dnssec::dnssec::{ConfiguredPolicy, ProofKind};
use heimdall_dnssec::{ValidationRequest, ValidationResult};

const APEX_TYPES: &[RecordType] = &[
    RecordType::NS,
    RecordType::SOA,
    RecordType::RRSIG,
    RecordType::NSEC,
    RecordType::DNSKEY,
];

#[tokio::test]
async fn test_nxdomain_with_nsec() {
    let world = World::new();
    let validator = world.validator();
    let soa = world.example.sign(soa_record("example.com"));
    let nsec = world
        .example
        .sign(nsec_record("example.com", "www.example.com", APEX_TYPES));
    let request = ValidationRequest::negative(
        name("nx.example.com"),
        RecordType::A,
        response(ResponseCode::NxDomain, [soa, nsec]),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::Secure);
    assert!(outcome.secure);
    assert_eq!(outcome.proofs.get(ProofKind::NoQName), Some(&name("example.com")));
    assert_eq!(outcome.proofs.get(ProofKind::NoWildcard), Some(&name("example.com")));
    assert_eq!(outcome.proofs.get(ProofKind::NoData), None);
}

#[tokio::test]
async fn test_nxdomain_missing_wildcard_proof() {
    let world = World::new();
    let validator = world.validator();
    // covers nx.example.com but not *.example.com, which sorts before "a"
    let nsec = world
        .example
        .sign(nsec_record("a.example.com", "z.example.com", &[RecordType::A, RecordType::NSEC]));
    let request = ValidationRequest::negative(
        name("nx.example.com"),
        RecordType::A,
        response(ResponseCode::NxDomain, [nsec]),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::NoValidDenialProof);
    assert!(!outcome.secure);
}

#[tokio::test]
async fn test_nodata_with_nsec() {
    let world = World::new();
    let validator = world.validator();
    let nsec = world.example.sign(nsec_record(
        "www.example.com",
        "example.com",
        &[RecordType::A, RecordType::RRSIG, RecordType::NSEC],
    ));
    let request = ValidationRequest::negative(
        name("www.example.com"),
        RecordType::MX,
        response(ResponseCode::NoError, [nsec]),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::Secure);
    assert_eq!(outcome.proofs.get(ProofKind::NoData), Some(&name("www.example.com")));
}

#[tokio::test]
async fn test_nodata_denied_by_type_bitmap() {
    let world = World::new();
    let validator = world.validator();
    // the NSEC says MX exists, so it cannot prove MX NODATA
    let nsec = world.example.sign(nsec_record(
        "www.example.com",
        "example.com",
        &[RecordType::A, RecordType::MX, RecordType::RRSIG, RecordType::NSEC],
    ));
    let request = ValidationRequest::negative(
        name("www.example.com"),
        RecordType::MX,
        response(ResponseCode::NoError, [nsec]),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert!(!outcome.result.is_success());
}

#[tokio::test]
async fn test_cached_nodata_entry_becomes_secure() {
    let world = World::new();
    let validator = world.validator();
    let nsec = world.example.sign(nsec_record(
        "www.example.com",
        "example.com",
        &[RecordType::A, RecordType::RRSIG, RecordType::NSEC],
    ));
    let entry = NegativeEntry::new(name("www.example.com"), RecordType::TXT, NegativeKind::NoData)
        .with_records([nsec])
        .with_trust(Trust::PendingAnswer);

    let outcome = validator
        .validate(ValidationRequest::cached_negative(entry))
        .await
        .expect("task created");

    assert_eq!(outcome.result, ValidationResult::Secure);
    let entry = outcome.negative_entry().expect("entry returned");
    assert_eq!(entry.trust, Trust::Secure);
    assert_eq!(entry.records[0].rrset.trust, Trust::Secure);
}

fn nsec3_zone(world: &World, iterations: u16) -> Vec<heimdall_dnssec::dns::SignedSet> {
    let zone = world.example.name.clone();
    let names = vec![
        (
            zone.clone(),
            vec![
                RecordType::NS,
                RecordType::SOA,
                RecordType::RRSIG,
                RecordType::DNSKEY,
                RecordType::NSEC3PARAM,
            ],
        ),
        (name("www.example.com"), vec![RecordType::A, RecordType::RRSIG]),
    ];
    nsec3_chain(&zone, &names, iterations, 0)
        .into_iter()
        .map(|set| world.example.sign(set))
        .collect()
}

#[tokio::test]
async fn test_nxdomain_with_nsec3() {
    let world = World::new();
    let validator = world.validator();
    let mut authority = vec![world.example.sign(soa_record("example.com"))];
    authority.extend(nsec3_zone(&world, 5));
    let request = ValidationRequest::negative(
        name("nx.example.com"),
        RecordType::A,
        response(ResponseCode::NxDomain, authority),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::Secure);
    assert_eq!(
        outcome.proofs.get(ProofKind::ClosestEncloser),
        Some(&nsec3_owner(&name("example.com"), &name("example.com"), 5))
    );
    assert!(outcome.proofs.get(ProofKind::NoQName).is_some());
    assert!(outcome.proofs.get(ProofKind::NoWildcard).is_some());
    assert!(!outcome.opt_out);
}

#[tokio::test]
async fn test_nodata_with_nsec3() {
    let world = World::new();
    let validator = world.validator();
    let request = ValidationRequest::negative(
        name("www.example.com"),
        RecordType::AAAA,
        response(ResponseCode::NoError, nsec3_zone(&world, 0)),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::Secure);
    assert_eq!(
        outcome.proofs.get(ProofKind::NoData),
        Some(&nsec3_owner(&name("www.example.com"), &name("example.com"), 0))
    );
}

#[tokio::test]
async fn test_nsec3_iterations_over_limit_is_insecure() {
    let world = World::new();
    let config = ValidatorConfig {
        max_nsec3_iterations: 10,
        ..ValidatorConfig::default()
    };
    let validator = world.validator_with(config, ConfiguredPolicy::new());
    let request = ValidationRequest::negative(
        name("nx.example.com"),
        RecordType::A,
        response(ResponseCode::NxDomain, nsec3_zone(&world, 50)),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::ProvenInsecure);
    assert!(outcome.proofs.get(ProofKind::NoQName).is_some());
}

#[tokio::test]
async fn test_nsec3_iterations_over_limit_must_be_secure() {
    let world = World::new();
    let config = ValidatorConfig {
        max_nsec3_iterations: 10,
        ..ValidatorConfig::default()
    };
    let policy = ConfiguredPolicy::new().require_secure(name("example.com"));
    let validator = world.validator_with(config, policy);
    let request = ValidationRequest::negative(
        name("nx.example.com"),
        RecordType::A,
        response(ResponseCode::NxDomain, nsec3_zone(&world, 50)),
    );

    let outcome = validator.validate(request).await.expect("task created");

    // excessive iterations carry no must-be-secure reason
    assert_eq!(outcome.result, ValidationResult::ProvenInsecure);
}

#[tokio::test]
async fn test_negative_answer_without_signatures_fails() {
    let world = World::new();
    let validator = world.validator();
    let unsigned = heimdall_dnssec::dns::SignedSet::new(
        nsec_record("example.com", "www.example.com", APEX_TYPES),
        None,
    );
    let request = ValidationRequest::negative(
        name("nx.example.com"),
        RecordType::A,
        response(ResponseCode::NxDomain, [unsigned]),
    );

    let outcome = validator.validate(request).await.expect("task created");

    assert!(!outcome.result.is_success());
}

fn wildcard_zone_nsec3(world: &World, flags: u8) -> Vec<heimdall_dnssec::dns::SignedSet> {
    let zone = world.example.name.clone();
    let names = vec![
        (
            zone.clone(),
            vec![RecordType::NS, RecordType::SOA, RecordType::RRSIG, RecordType::DNSKEY],
        ),
        (name("*.example.com"), vec![RecordType::A, RecordType::RRSIG]),
    ];
    nsec3_chain(&zone, &names, 0, flags)
        .into_iter()
        .map(|set| world.example.sign(set))
        .collect()
}

fn wildcard_answer(world: &World, authority: Vec<heimdall_dnssec::dns::SignedSet>) -> ValidationRequest {
    let answer = world
        .example
        .sign_as(a_record("host.example.com", [192, 0, 2, 5]), &name("*.example.com"));
    ValidationRequest::positive(answer.rrset, answer.sigs.expect("signed"))
        .with_message(response(ResponseCode::NoError, authority))
}

#[tokio::test]
async fn test_wildcard_answer_with_nsec3_noqname() {
    let world = World::new();
    let validator = world.validator();
    let request = wildcard_answer(&world, wildcard_zone_nsec3(&world, 0));

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::Secure);
    assert!(outcome.proofs.get(ProofKind::NoQName).is_some());
    assert!(!outcome.opt_out);
}

#[tokio::test]
async fn test_wildcard_answer_under_opt_out_is_insecure() {
    let world = World::new();
    let validator = world.validator();
    let request = wildcard_answer(&world, wildcard_zone_nsec3(&world, 1));

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::ProvenInsecure);
    assert!(outcome.opt_out);
}

#[tokio::test]
async fn test_unknown_nsec3_hash_is_insecure() {
    let world = World::new();
    let validator = world.validator();
    let zone = world.example.name.clone();
    let names = vec![
        (zone.clone(), vec![RecordType::NS, RecordType::SOA]),
        (name("*.example.com"), vec![RecordType::A]),
    ];
    let authority = nsec3_chain(&zone, &names, 0, 0)
        .into_iter()
        .map(|mut set| {
            for rdata in &mut set.rdata {
                if let heimdall_dnssec::dns::RData::Nsec3(nsec3) = rdata {
                    nsec3.hash_algorithm = 2;
                }
            }
            world.example.sign(set)
        })
        .collect();
    let request = wildcard_answer(&world, authority);

    let outcome = validator.validate(request).await.expect("task created");

    assert_eq!(outcome.result, ValidationResult::ProvenInsecure);
}
