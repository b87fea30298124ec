use device_sample::controller::{self, ControllerClient, DeviceScript};
use device_sample::error::{ControllerError, ErrorCode};
use device_sample::model::{DeviceConfig, DeviceState, ServiceState};
use reconcile_engine::{EntityId, LifecycleOrchestrator, Operation, Phase};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Real controller actor, driven directly through its client (no engine involved).
fn spawn_controller(boot_reads: u32) -> (ControllerClient, JoinHandle<()>) {
    let (actor, client) = controller::new(boot_reads);
    let handle = tokio::spawn(actor.run(CancellationToken::new()));
    (client, handle)
}

fn ctx() -> CancellationToken {
    CancellationToken::new()
}

fn device() -> EntityId {
    EntityId::new("default", "aa:bb:cc:dd:ee:ff")
}

async fn read_state(client: &ControllerClient, id: &EntityId) -> Result<DeviceState, ControllerError> {
    client.get_device(&ctx(), id).await.map(|d| d.state())
}

#[tokio::test]
async fn test_adoption_progresses_one_state_per_read() {
    let (client, handle) = spawn_controller(0);
    let id = device();

    let accepted = client.adopt_device(&ctx(), &id, DeviceConfig::named("lobby-ap")).await.unwrap();
    assert_eq!(accepted.state(), DeviceState::Pending);
    assert_eq!(accepted.site, "default");

    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Adopting);
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Provisioning);
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Connected);
    // Settled states repeat
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Connected);

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_busy_answers_carry_code_and_hint() {
    let (client, handle) = spawn_controller(0);
    let id = device();
    client
        .script(&id, DeviceScript::default().with_busy(2).with_busy_retry_after(Duration::from_secs(5)))
        .await
        .unwrap();

    for _ in 0..2 {
        let err = client.adopt_device(&ctx(), &id, DeviceConfig::default()).await.unwrap_err();
        assert_eq!(err.code(), Some(&ErrorCode::DeviceBusy));
        assert!(matches!(
            err,
            ControllerError::Api { retry_after: Some(hint), .. } if hint == Duration::from_secs(5)
        ));
    }
    assert!(client.adopt_device(&ctx(), &id, DeviceConfig::default()).await.is_ok());

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_flicker_hides_device_for_scripted_reads() {
    let (client, handle) = spawn_controller(0);
    let id = device();
    client.script(&id, DeviceScript::default().with_flicker(2)).await.unwrap();
    client.adopt_device(&ctx(), &id, DeviceConfig::default()).await.unwrap();

    for _ in 0..2 {
        let err = read_state(&client, &id).await.unwrap_err();
        assert_eq!(err.code(), Some(&ErrorCode::NotFound));
    }
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Adopting);

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_forget_removes_device_after_progression() {
    let (client, handle) = spawn_controller(0);
    let id = device();
    client
        .script(&id, DeviceScript::default().with_adopt([DeviceState::Connected]).with_forget([DeviceState::Deleting, DeviceState::Deleting]))
        .await
        .unwrap();
    client.adopt_device(&ctx(), &id, DeviceConfig::default()).await.unwrap();
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Connected);

    let forgetting = client.forget_device(&ctx(), &id).await.unwrap();
    assert_eq!(forgetting.state(), DeviceState::Deleting);
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Deleting);
    assert_eq!(read_state(&client, &id).await.unwrap(), DeviceState::Deleting);

    let err = read_state(&client, &id).await.unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::NotFound));

    // Forgetting again reports the device as unknown
    let err = client.forget_device(&ctx(), &id).await.unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::NotFound));

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_update_unknown_device_is_not_found() {
    let (client, handle) = spawn_controller(0);

    let err = client.update_device(&ctx(), &device(), DeviceConfig::named("x")).await.unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::NotFound));

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_booting_controller_rejects_device_requests() {
    let (client, handle) = spawn_controller(2);
    let id = device();

    let err = client.adopt_device(&ctx(), &id, DeviceConfig::default()).await.unwrap_err();
    assert_eq!(err.code(), Some(&ErrorCode::ServiceUnavailable));

    assert_eq!(client.status(&ctx()).await.unwrap(), ServiceState::Starting);
    assert_eq!(client.status(&ctx()).await.unwrap(), ServiceState::Starting);
    assert_eq!(client.status(&ctx()).await.unwrap(), ServiceState::Ready);

    assert!(client.adopt_device(&ctx(), &id, DeviceConfig::default()).await.is_ok());

    drop(client);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_releases_calls_to_a_stalled_controller() {
    // The actor is never run: requests queue up and no reply ever comes
    let (_actor, client) = controller::new(0);
    let orchestrator = LifecycleOrchestrator::new(client);

    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(600),
        orchestrator.transition(&ctx, &device(), Operation::Adopt(DeviceConfig::default())),
    )
    .await
    .expect("transition should return once cancelled");

    let err = outcome.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.phase(), Phase::Mutate);

    let err = orchestrator.adapter().get_device(&ctx, &device()).await.unwrap_err();
    assert!(matches!(err, ControllerError::Cancelled));
}
