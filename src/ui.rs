use std::io::Write;

use anyhow::{bail, Result};

use crate::app::Controller;
use crate::clipboard::copy_to_clipboard;

/// Stream the current request to stdout, printing each delta as it lands.
/// Ctrl-C cancels the request.
pub async fn stream_to_terminal<W: Write>(controller: &mut Controller, out: &mut W) -> Result<()> {
    let mut printed = 0;
    loop {
        let active = tokio::select! {
            active = controller.pump() => active,
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                writeln!(out)?;
                log::info!("Request cancelled");
                return Ok(());
            }
        };

        let result = &controller.state().result;
        if result.len() > printed {
            out.write_all(result[printed..].as_bytes())?;
            out.flush()?;
            printed = result.len();
        }
        if !active {
            break;
        }
    }
    writeln!(out)?;

    if let Some(err) = &controller.state().error {
        bail!("{err}");
    }
    Ok(())
}

/// Copy the finished result, logging instead of failing.
pub fn copy_result(controller: &Controller) {
    let state = controller.state();
    if state.result.is_empty() || state.incomplete {
        log::warn!("Nothing complete to copy");
        return;
    }
    if let Err(e) = copy_to_clipboard(&state.result) {
        log::error!("Clipboard error: {e}");
    }
}
