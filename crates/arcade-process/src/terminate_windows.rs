//! Windows-specific termination by image name.
//!
//! Uses `taskkill`:
//! - without `/F` it posts a close request to the image's top-level windows
//! - with `/F /T` it terminates every matching process and its children
//!
//! taskkill exits with code 128 when nothing matches the filter; that is the
//! normal outcome once a game has already closed and is not treated as an error.

use arcade_common::{ImageName, ProcessError, ProcessResult};
use tokio::process::Command;
use tracing::{debug, info};

/// taskkill exit code for "no process found".
const TASKKILL_NOT_FOUND: i32 = 128;

/// Run taskkill against every process named `image`.
pub async fn taskkill_image(image: &ImageName, force: bool) -> ProcessResult<()> {
    let args = taskkill_args(image, force);
    debug!("Running taskkill {:?}", args);

    let output = Command::new("taskkill")
        .args(&args)
        .output()
        .await
        .map_err(|e| phase_error(image, force, format!("failed to run taskkill: {}", e)))?;

    match output.status.code() {
        Some(0) => {
            info!("taskkill ({}) succeeded for {}", phase_name(force), image);
            Ok(())
        }
        Some(TASKKILL_NOT_FOUND) => {
            debug!("taskkill found no process named {}", image);
            Ok(())
        }
        code => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(phase_error(
                image,
                force,
                format!("taskkill exited with {:?}: {}", code, stderr.trim()),
            ))
        }
    }
}

fn taskkill_args(image: &ImageName, force: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(4);
    if force {
        args.push("/F".to_string());
    }
    args.push("/T".to_string());
    args.push("/IM".to_string());
    args.push(image.as_str().to_string());
    args
}

fn phase_name(force: bool) -> &'static str {
    if force {
        "forced"
    } else {
        "graceful"
    }
}

fn phase_error(image: &ImageName, force: bool, reason: String) -> ProcessError {
    if force {
        ProcessError::forced_kill_failed(image.as_str(), reason)
    } else {
        ProcessError::graceful_kill_failed(image.as_str(), reason)
    }
}
