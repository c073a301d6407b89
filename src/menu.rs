//! Interactive loop shown once the spot instance is up.

use std::io::{BufRead, Write};

use yansi::Paint;

use crate::api::Ec2Api;
use crate::error::ProvisionError;
use crate::models::{Reservation, Teardown};
use crate::services::Provisioner;

const RULE: &str = "=======================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Cancel,
    ShowAddress,
    ShowInstanceType,
    ShowRequestId,
    /// Anything unrecognised: show the menu again.
    Redisplay,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "0" => MenuChoice::Cancel,
            "1" => MenuChoice::ShowAddress,
            "2" => MenuChoice::ShowInstanceType,
            "3" => MenuChoice::ShowRequestId,
            _ => MenuChoice::Redisplay,
        }
    }
}

fn write_menu<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\n\n")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "1: Shows IP Address")?;
    writeln!(out, "2: Shows Instance Type")?;
    writeln!(out, "3: Shows Request Id")?;
    writeln!(out, "0: Cancel spot instance")?;
    write!(out, "Enter your choice:")?;
    out.flush()
}

/// Run the menu until the reservation is cancelled or `input` ends.
///
/// Returns the teardown outcome, or `None` when input ran out and the
/// request was left in place. A failed cancel is reported and the menu keeps
/// going.
pub async fn run_menu<A, R, W>(
    provisioner: &Provisioner<A>,
    reservation: &mut Reservation,
    input: R,
    out: &mut W,
) -> Result<Option<Teardown>, ProvisionError>
where
    A: Ec2Api,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write_menu(out)?;
        let Some(line) = lines.next() else {
            writeln!(out)?;
            writeln!(
                out,
                "{} {}",
                Paint::new("Input closed; spot request left active:").yellow(),
                reservation.request_id
            )?;
            tracing::warn!(request_id = %reservation.request_id, "Menu input closed before cancellation");
            return Ok(None);
        };
        let line = line?;
        writeln!(out, "{}", RULE)?;
        writeln!(out, "\n")?;

        match MenuChoice::parse(&line) {
            MenuChoice::ShowAddress => {
                match provisioner.public_ip_address(&reservation.instance_id).await {
                    Ok(ip) if !ip.is_empty() => reservation.public_ip = ip,
                    Ok(_) => {}
                    Err(e) => writeln!(out, "{}: {}", Paint::new("Failed to look up address").red(), e)?,
                }
                let shown = if reservation.public_ip.is_empty() {
                    "(unknown)"
                } else {
                    reservation.public_ip.as_str()
                };
                writeln!(out, "Public IP Address: {}", shown)?;
            }
            MenuChoice::ShowInstanceType => writeln!(out, "Instance Type: {}", reservation.instance_type)?,
            MenuChoice::ShowRequestId => writeln!(out, "Request Id: {}", reservation.request_id)?,
            MenuChoice::Cancel => match provisioner.cancel_spot_request(&reservation.request_id).await {
                Ok(teardown) => {
                    writeln!(out, "{}", Paint::new("Spot instance request canceled").green())?;
                    if let Some(instance_id) = teardown.terminated_instance() {
                        writeln!(out, "Instance {} terminated", instance_id)?;
                    }
                    return Ok(Some(teardown));
                }
                Err(e) => {
                    tracing::error!(request_id = %reservation.request_id, %e, "Cancel failed");
                    writeln!(out, "{}: {}", Paint::new("Failed to cancel spot request").red(), e)?;
                }
            },
            MenuChoice::Redisplay => {}
        }
    }
}
