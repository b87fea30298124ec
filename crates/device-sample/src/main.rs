use device_sample::config::load_policy;
use device_sample::lifecycle::ControllerHarness;
use device_sample::model::DeviceConfig;
use reconcile_engine::tracing::setup_tracing;
use reconcile_engine::{EntityId, Operation};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let policy = load_policy().map_err(|e| e.to_string())?;
    info!(?policy, "Starting device reconciliation demo");

    let harness = ControllerHarness::start_booting(4);
    let ctx = CancellationToken::new();
    harness
        .wait_ready(&ctx, Duration::from_secs(30))
        .await
        .map_err(|e| e.to_string())?;

    let orchestrator = harness.orchestrator(policy);
    let id = EntityId::new("default", "f4:92:bf:12:34:56");

    let span = tracing::info_span!("device_lifecycle", device = %id);
    let outcome = async {
        let adopted = orchestrator
            .transition(&ctx, &id, Operation::Adopt(DeviceConfig::named("lobby-ap")))
            .await?;
        info!(state = %adopted.state, "Device adopted");

        let updated = orchestrator
            .transition(
                &ctx,
                &id,
                Operation::Update(DeviceConfig::default().with_port_profile("guest-vlan")),
            )
            .await?;
        let profile = updated.attributes.as_ref().and_then(|d| d.port_profile.as_deref());
        info!(state = %updated.state, ?profile, "Device updated");

        orchestrator.transition(&ctx, &id, Operation::Forget).await?;
        info!("Device forgotten");
        Ok::<_, reconcile_engine::TransitionError<_, _>>(())
    }
    .instrument(span)
    .await;

    if let Err(e) = &outcome {
        error!(error = %e, phase = %e.phase(), "Device lifecycle failed");
    }

    drop(orchestrator);
    harness.shutdown().await.map_err(|e| e.to_string())?;

    outcome.map_err(|e| e.to_string())?;
    info!("Demo completed successfully");
    Ok(())
}
