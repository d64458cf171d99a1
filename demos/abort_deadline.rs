//! Abort deadline demonstration
//!
//! Events handed off before the consumer loads are buffered. If the consumer
//! never attaches, the scheduled abort discards the backlog and the agent stops
//! recording. This example runs both outcomes side by side.
//!
//! # Running the example
//!
//! ```bash
//! cargo run --example abort_deadline
//! ```

use hookwire::diagnostics;
use hookwire::handle::{self, HANDLE_BUS};
use hookwire::prelude::*;
use std::time::Duration;

fn buffered_agent() -> hookwire::Result<Agent> {
    let agent = Agent::new(LoaderConfig::default().with_abort_after(Duration::from_millis(200)));
    handle::mark(&agent, "firstbyte", 12)?;
    handle::handle(
        &agent,
        "record-supportability",
        Args::new(vec![Value::from("API/setCustomAttribute")]),
        Scope::Fresh,
        None,
    )?;
    Ok(agent)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    diagnostics::init_tracing();

    println!("{}", "=".repeat(80));
    println!("Abort Deadline Demonstration");
    println!("{}", "=".repeat(80));
    println!();

    let abandoned = buffered_agent()?;
    let attached = buffered_agent()?;

    for agent in [&abandoned, &attached] {
        println!("Buffered groups: {:?}", agent.backlog().groups());
    }

    let abandoned_abort = abandoned.schedule_abort();
    let attached_abort = attached.schedule_abort();

    // The consumer for the second agent arrives in time and drains its groups
    tokio::time::sleep(Duration::from_millis(50)).await;
    for group in attached.backlog().groups() {
        for event in attached.backlog().take(&group).unwrap_or_default() {
            println!("  drained [{}] {}", group, event.printable_summary());
        }
    }

    println!();
    println!("Abandoned agent aborted: {}", abandoned_abort.await?);
    println!("Attached agent aborted:  {}", attached_abort.await?);

    let late = handle::mark(&abandoned, "late", 900)?;
    println!();
    println!(
        "Emission after abort delivered: {} (buffered events: {})",
        late.is_some(),
        abandoned.backlog().total_len()
    );
    println!(
        "Attached agent still records on '{}': {}",
        HANDLE_BUS,
        !attached.get(HANDLE_BUS).is_aborted()
    );

    Ok(())
}
