//! End-to-end composition and submission against in-memory chains

mod common;

use common::{bridge_account, relay_config_account, settings, FakeSource, FlakyBroadcaster};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::sync::Arc;
use std::time::Duration;

use solbridge::address::EvmAddress;
use solbridge::pda::SolanaPdaService;
use solbridge::retry::RetryPolicy;
use solbridge::tx_builder::instructions::{classify_instruction, InstructionRole};
use solbridge::tx_builder::{
    BridgeError, CallKind, ContractCall, NativeBridgeRequest, PlanPath, SubmissionManager,
    SubmissionSettings, TransactionComposer,
};
use solbridge::wallet::KeypairSigner;

fn composer(source: FakeSource, s: solbridge::tx_builder::ComposerSettings) -> TransactionComposer {
    TransactionComposer::new(
        Arc::new(source),
        Arc::new(SolanaPdaService),
        s,
        RetryPolicy::no_retry(),
    )
}

fn request(payer: Pubkey) -> NativeBridgeRequest {
    NativeBridgeRequest {
        payer,
        destination: EvmAddress::new([0xBB; 20]),
        amount: 1_000,
        call: None,
    }
}

#[tokio::test]
async fn test_relay_instruction_precedes_bridge() {
    let s = settings();
    let source = FakeSource::new(&[bridge_account(&s), relay_config_account(&s)]);
    let composer = composer(source, s.clone());

    let plan = composer.build_native(request(Pubkey::new_unique())).await.unwrap();

    assert_eq!(plan.path, PlanPath::Relayed);
    let roles: Vec<InstructionRole> = plan
        .instructions
        .iter()
        .map(|ix| classify_instruction(ix, &s.discriminators))
        .collect();
    assert_eq!(roles, vec![InstructionRole::Relay, InstructionRole::Bridge]);

    // the relay payment references the same outgoing message as the bridge
    let relay_data = &plan.instructions[0].data;
    assert_eq!(&relay_data[40..72], &plan.outgoing_message.to_bytes()[..]);
    assert_eq!(&relay_data[8..40], plan.salt.as_bytes());
    assert!(composer.sanity_check_plan_order(&plan).is_ok());
}

#[tokio::test]
async fn test_missing_relay_config_yields_single_bridge_instruction() {
    let s = settings();
    let source = FakeSource::new(&[bridge_account(&s)]);
    let composer = composer(source, s.clone());

    let plan = composer.build_native(request(Pubkey::new_unique())).await.unwrap();

    assert_eq!(plan.path, PlanPath::BridgeOnly);
    assert_eq!(plan.instructions.len(), 1);
    assert_eq!(
        classify_instruction(&plan.instructions[0], &s.discriminators),
        InstructionRole::Bridge
    );
}

#[tokio::test]
async fn test_unreachable_relay_config_is_not_fatal() {
    let s = settings();
    let mut source = FakeSource::new(&[bridge_account(&s)]);
    source.unreachable.insert(relay_config_account(&s));
    let composer = composer(source, s);

    let plan = composer.build_native(request(Pubkey::new_unique())).await.unwrap();
    assert_eq!(plan.path, PlanPath::BridgeOnly);
}

#[tokio::test]
async fn test_each_build_uses_a_fresh_salt() {
    let s = settings();
    let source = FakeSource::new(&[bridge_account(&s)]);
    let composer = composer(source, s);
    let payer = Pubkey::new_unique();

    let a = composer.build_native(request(payer)).await.unwrap();
    let b = composer.build_native(request(payer)).await.unwrap();
    assert_ne!(a.salt, b.salt);
    assert_ne!(a.outgoing_message, b.outgoing_message);
}

#[tokio::test]
async fn test_invalid_call_is_rejected_before_any_lookup() {
    let err = ContractCall::from_parts(CallKind::Call, Some(""), "0", "0x").unwrap_err();
    assert!(matches!(err, BridgeError::Format(_)));

    let s = settings();
    let composer = composer(FakeSource::new(&[]), s);
    let mut req = request(Pubkey::new_unique());
    req.call = Some(ContractCall::Call {
        target: EvmAddress::ZERO,
        value: 0,
        data: vec![],
    });
    let err = composer.build_native(req).await.unwrap_err();
    assert!(matches!(err, BridgeError::Format(_)));
}

#[tokio::test]
async fn test_resubmission_is_idempotent() {
    let s = settings();
    let keypair = Keypair::new();
    let payer = keypair.pubkey();
    let composer = composer(
        FakeSource::new(&[bridge_account(&s), relay_config_account(&s)]),
        s,
    );
    let submitter = SubmissionManager::new(
        Arc::new(KeypairSigner::new(keypair)),
        Arc::new(FlakyBroadcaster::default()),
        SubmissionSettings {
            confirm_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        },
        RetryPolicy::no_retry(),
    );

    let plan = composer.build_native(request(payer)).await.unwrap();
    let signed = submitter.sign(plan).await.unwrap();

    let first = submitter.submit(&signed).await.unwrap();
    let second = submitter.submit(&signed).await.unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.signature, second.signature);
    assert_eq!(second.signature, signed.signature);
    submitter.confirm(&second).await.unwrap();
}

#[tokio::test]
async fn test_non_duplicate_send_errors_propagate() {
    let s = settings();
    let keypair = Keypair::new();
    let payer = keypair.pubkey();
    let composer = composer(FakeSource::new(&[bridge_account(&s)]), s);
    let broadcaster = FlakyBroadcaster::default();
    *broadcaster.first_error.lock().unwrap() =
        Some(BridgeError::remote("fake-rpc", "Blockhash not found"));
    let submitter = SubmissionManager::new(
        Arc::new(KeypairSigner::new(keypair)),
        Arc::new(broadcaster),
        SubmissionSettings::default(),
        RetryPolicy::default(),
    );

    let signed = submitter
        .sign(composer.build_native(request(payer)).await.unwrap())
        .await
        .unwrap();
    let err = submitter.submit(&signed).await.unwrap_err();
    assert!(matches!(err, BridgeError::RemoteCall { .. }));
}
