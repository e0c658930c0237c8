//! Watch a camera: print state changes and live-view frame rates.
//!
//! ```text
//! LUMIX_LOG_MODE=development cargo run -p lumix-sdk --example watch_camera
//! ```

use lumix_sdk::{catalog, keys, CameraConfig, LumixCamera, SdkError};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), SdkError> {
    lumix_sdk::logging::init_logging_from_env()?;

    let config = CameraConfig::load_default()?;
    let mut camera = tokio::task::spawn_blocking(move || LumixCamera::discover(config)).await??;
    println!("Found {} ({})", camera.descriptor().friendly_name, camera.descriptor().model_name);

    camera.invoke_async(catalog::get_state()).await?;
    if let Some(mode) = camera.state().get(keys::CAMERA_MODE) {
        println!("Camera mode: {}", mode);
    }
    let mut events = camera.subscribe_events().await?;
    let (_viewer, mut frames) = camera.attach_viewer();

    let bind: SocketAddr = ([0, 0, 0, 0], lumix_sdk::DEFAULT_STREAM_PORT).into();
    camera.start_live_view(bind).await?;

    let started = Instant::now();
    let mut count = 0u64;
    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            item = events.next() => match item {
                Some(Ok(notification)) => {
                    for (name, value) in &notification.properties {
                        println!("  {} = {}", name, value);
                    }
                    if let Some(level) = camera.state().get_i64(keys::BATTERY_LEVEL) {
                        println!("  battery at {}%", level);
                    }
                }
                Some(Err(e)) => {
                    println!("Event subscription ended: {}", e);
                    break;
                }
                None => break,
            },
            frame = frames.recv() => match frame {
                Some(Ok(_)) => {
                    count += 1;
                    if count % 30 == 0 {
                        let fps = count as f64 / started.elapsed().as_secs_f64();
                        println!("{} frames, {:.1} fps", count, fps);
                    }
                }
                Some(Err(e)) => {
                    println!("Viewer fell behind: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    let stats = camera.stop_live_view().await?;
    println!("Live view stopped: {:?}", stats);
    camera.shutdown().await
}
