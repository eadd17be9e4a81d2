use std::{thread::sleep, time::Duration};

use rppal::gpio::{self, Gpio};
use rs_minuterie::relay::RelayBank;

fn main() -> gpio::Result<()> {
    let gpio = Gpio::new()?;
    let mut bank = RelayBank::new();
    let pump = bank.add(gpio.get(12)?.into_output());
    let lights = bank.add(gpio.get(16)?.into_output());

    println!("Pump ON");
    bank.set_state(pump, true);

    sleep(Duration::from_secs(10));

    println!("Garden lights ON");
    bank.set_state(lights, true);
    println!("States: {}", bank.all_states());

    sleep(Duration::from_secs(10));

    println!("Toggle the pump");
    bank.toggle_state(pump);

    sleep(Duration::from_secs(10));

    println!("Shutdown everything");
    bank.set_state(pump, false);
    bank.set_state(lights, false);
    println!("States: {}", bank.all_states());

    Ok(())
}
