mod common;

use address_check::config::EngineConfig;
use address_check::{AddressField, CheckOptions, ProcessResult, ProcessStatus};
use common::{
    engine, engine_with, entity, fast_config, response, torstr, Choice, RecordingVerifier,
    ScriptedPresenter,
};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::time::Duration;

fn shipping_address() -> address_check::AddressSnapshot {
    torstr()
        .with(AddressField::StreetName, "Invalidenstr")
        .with(AddressField::BuildingNumber, "117")
}

#[tokio::test]
async fn concurrent_triggers_share_a_single_pass() {
    let verifier = RecordingVerifier::new();
    verifier.respond(&torstr(), Ok(response(&["address_correct"], vec![torstr()])));
    verifier.hold();
    let engine = engine(verifier.clone(), ScriptedPresenter::new());
    let (_binding, billing) = entity("billing", &torstr());

    let checks = (0..5).map(|_| engine.check_address(&billing, CheckOptions::background()));
    let (results, ()) = tokio::join!(join_all(checks), async {
        verifier.entered().await;
        assert_eq!(billing.queue().len(), 1);
        verifier.release();
    });

    assert_eq!(verifier.call_count(), 1);
    assert_eq!(billing.sequence(), 1);
    assert!(results.iter().all(|result| *result == results[0]));
    assert_eq!(results[0].process_status, ProcessStatus::Finished);
    assert!(billing.queue().is_empty());
}

#[tokio::test]
async fn interactive_recheck_is_not_blocked_by_an_open_dialog() {
    let verifier = RecordingVerifier::new();
    verifier.respond(
        &torstr(),
        Ok(response(
            &["address_multiple_variants"],
            vec![
                torstr().with(AddressField::BuildingNumber, "1a"),
                torstr().with(AddressField::BuildingNumber, "1b"),
            ],
        )),
    );
    let corrected = torstr().with(AddressField::BuildingNumber, "2");
    verifier.respond(
        &corrected,
        Ok(response(&["address_correct"], vec![corrected.clone()])),
    );
    let edited_again = torstr().with(AddressField::BuildingNumber, "3");
    verifier.respond(
        &edited_again,
        Ok(response(&["address_correct"], vec![edited_again.clone()])),
    );
    let presenter = ScriptedPresenter::new();
    presenter.hold();
    let engine = engine(verifier.clone(), presenter.clone());
    let (_binding, billing) = entity("billing", &torstr());

    let dialog = tokio::spawn({
        let engine = engine.clone();
        let billing = billing.clone();
        async move {
            engine
                .check_address(&billing, CheckOptions::background())
                .await
        }
    });
    presenter.entered().await;
    assert_eq!(engine.context().open_modals(), 1);

    billing.edit_field(AddressField::BuildingNumber, "2");
    let interactive = tokio::time::timeout(
        Duration::from_secs(1),
        engine.check_address(&billing, CheckOptions::interactive()),
    )
    .await
    .expect("level 1 pass must not wait behind level 0");
    assert_eq!(interactive.process_status, ProcessStatus::Finished);
    assert_eq!(interactive.address, corrected);

    billing.edit_field(AddressField::BuildingNumber, "3");
    let background = tokio::spawn({
        let engine = engine.clone();
        let billing = billing.clone();
        async move {
            engine
                .check_address(&billing, CheckOptions::background())
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(
        !background.is_finished(),
        "level 0 waits for the earlier level 0 of the same entity"
    );
    assert!(!verifier
        .calls()
        .iter()
        .any(|call| call.fingerprint() == edited_again.fingerprint()));

    presenter.release();
    let stale = dialog.await.expect("dialog task");
    assert_eq!(stale.process_status, ProcessStatus::InvalidResult);
    let after = background.await.expect("background task");
    assert_eq!(after.process_status, ProcessStatus::Finished);
    assert_eq!(billing.state().address, edited_again);
    assert_eq!(billing.sequence(), 3);
    assert!(billing.queue().is_empty());
}

#[tokio::test]
async fn open_dialog_does_not_block_other_entities() {
    let verifier = RecordingVerifier::new();
    verifier.respond(
        &torstr(),
        Ok(response(
            &["address_needs_correction"],
            vec![torstr().with(AddressField::BuildingNumber, "1a")],
        )),
    );
    verifier.respond(
        &shipping_address(),
        Ok(response(&["address_correct"], vec![shipping_address()])),
    );
    let presenter = ScriptedPresenter::new();
    presenter.hold();
    let config = EngineConfig {
        turn_timeout: Some(Duration::from_millis(200)),
        ..fast_config()
    };
    let engine = engine_with(config, verifier.clone(), presenter.clone());
    let (_b, billing) = entity("billing", &torstr());
    let (_s, shipping) = entity("shipping", &shipping_address());

    let dialog = tokio::spawn({
        let engine = engine.clone();
        let billing = billing.clone();
        async move {
            engine
                .check_address(&billing, CheckOptions::background())
                .await
        }
    });
    presenter.entered().await;

    let other = engine
        .check_address(&shipping, CheckOptions::background())
        .await;
    assert_eq!(other.process_status, ProcessStatus::Finished);
    assert!(shipping.state().checked_at.is_some());
    assert!(shipping.queue().is_empty());
    assert_eq!(billing.queue().len(), 1);

    presenter.release();
    let decided = dialog.await.expect("dialog task");
    assert_eq!(decided.process_status, ProcessStatus::Finished);
    assert!(billing.queue().is_empty());
}

#[tokio::test]
async fn edits_during_verification_discard_the_result() {
    let verifier = RecordingVerifier::new();
    verifier.respond(&torstr(), Ok(response(&["address_correct"], vec![torstr()])));
    verifier.hold();
    let engine = engine(verifier.clone(), ScriptedPresenter::new());
    let (_binding, billing) = entity("billing", &torstr());

    let pass = tokio::spawn({
        let engine = engine.clone();
        let billing = billing.clone();
        async move {
            engine
                .check_address(&billing, CheckOptions::background())
                .await
        }
    });
    verifier.entered().await;
    billing.edit_field(AddressField::Locality, "Hamburg");
    verifier.release();

    let result = pass.await.expect("pass task");
    assert_eq!(result.process_status, ProcessStatus::InvalidResult);
    let state = billing.state();
    assert!(state.statuses.is_empty());
    assert!(state.checked_at.is_none());
    assert_eq!(state.address.get(AddressField::Locality), Some("Hamburg"));
    assert!(billing.cache().is_empty(), "discarded responses are not cached");
    assert!(billing.queue().is_empty());
}

#[tokio::test]
async fn edits_while_the_dialog_is_open_discard_the_choice() {
    let verifier = RecordingVerifier::new();
    verifier.respond(
        &torstr(),
        Ok(response(
            &["address_needs_correction"],
            vec![torstr().with(AddressField::StreetName, "Torstraße")],
        )),
    );
    let presenter = ScriptedPresenter::with_choices(&[Choice::Prediction(0)]);
    presenter.hold();
    let engine = engine(verifier.clone(), presenter.clone());
    let (_binding, billing) = entity("billing", &torstr());

    let pass = tokio::spawn({
        let engine = engine.clone();
        let billing = billing.clone();
        async move {
            engine
                .check_address(&billing, CheckOptions::background())
                .await
        }
    });
    presenter.entered().await;
    billing.edit_field(AddressField::Locality, "Hamburg");
    presenter.release();

    let result = pass.await.expect("pass task");
    assert_eq!(result.process_status, ProcessStatus::InvalidResult);
    assert_eq!(verifier.call_count(), 1, "the chosen prediction is never verified");
    let state = billing.state();
    assert!(state.statuses.is_empty());
    assert!(state.checked_at.is_none());
    assert_eq!(state.address.get(AddressField::Locality), Some("Hamburg"));
    assert_eq!(
        state.address.get(AddressField::StreetName),
        Some("Torstr"),
        "the prediction is not written back"
    );
    assert_eq!(engine.context().open_modals(), 0);
    assert!(billing.queue().is_empty());
}

#[tokio::test]
async fn disabled_fields_discard_the_result() {
    let verifier = RecordingVerifier::new();
    verifier.respond(&torstr(), Ok(response(&["address_correct"], vec![torstr()])));
    verifier.hold();
    let engine = engine(verifier.clone(), ScriptedPresenter::new());
    let (binding, billing) = entity("billing", &torstr());

    let pass = tokio::spawn({
        let engine = engine.clone();
        let billing = billing.clone();
        async move {
            engine
                .check_address(&billing, CheckOptions::background())
                .await
        }
    });
    verifier.entered().await;
    binding.deactivate(AddressField::PostalCode);
    verifier.release();

    let result = pass.await.expect("pass task");
    assert_eq!(result.process_status, ProcessStatus::InvalidResult);
    assert!(billing.state().checked_at.is_none());
}

#[tokio::test]
async fn starved_turn_gives_up_with_a_network_error() {
    let verifier = RecordingVerifier::new();
    let config = EngineConfig {
        turn_timeout: Some(Duration::from_millis(40)),
        ..fast_config()
    };
    let engine = engine_with(config, verifier.clone(), ScriptedPresenter::new());
    let (_binding, billing) = entity("billing", &torstr());

    let stuck: BoxFuture<'static, ProcessResult> = futures::future::pending().boxed();
    assert!(billing.queue().enqueue("billing#stuck", stuck.shared()));

    let result = engine
        .check_address(&billing, CheckOptions::background())
        .await;

    assert_eq!(result.process_status, ProcessStatus::NetworkError);
    assert_eq!(verifier.call_count(), 0);
    assert_eq!(billing.queue().len(), 1);
    assert!(billing.queue().delete("billing#stuck"));
}
