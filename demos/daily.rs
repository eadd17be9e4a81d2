use std::time::Duration;

use rppal::gpio::Gpio;
use rs_minuterie::alarm::AlarmNumber;
use rs_minuterie::relay::{RelayBank, RelayCommand};
use rs_minuterie::RelayEvent;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gpio = Gpio::new()?;
    let mut bank = RelayBank::new();

    // Water heater on the off peak hours, split around midnight:
    // 00h00 to 07h30 and 23h30 to the end of the day
    let heater = bank.add(gpio.get(12)?.into_output());
    bank.add_alarm(heater, AlarmNumber::One, 0, 7 * 60 + 30);
    bank.add_alarm(heater, AlarmNumber::Two, 23 * 60 + 30, -1);

    println!("Schedule:\n{}", bank);

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (_command_tx, command_rx) = mpsc::channel::<RelayCommand>(16);
    let _task = bank
        .into_task(event_tx, command_rx, Duration::from_secs(60))
        .await;

    while let Some(event) = event_rx.recv().await {
        if let RelayEvent::StateChange(id, on) = event {
            println!("Relay {} switched {}", id, if on { "ON" } else { "OFF" });
        }
    }

    Ok(())
}
