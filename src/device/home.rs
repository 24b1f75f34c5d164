//! Home actuators

use crate::command::HomeCommand;
use crate::Result;
use std::net::IpAddr;
use tracing::info;

/// Music source started by [`HomeCommand::PlayMusic`]
pub const MUSIC_SOURCE: &str = "spotify";

/// Page shown by [`HomeCommand::ShowWeather`]
pub const WEATHER_PAGE: &str = "weather.com";

/// Page shown by [`HomeCommand::ShowNews`]
pub const NEWS_PAGE: &str = "cnn.com";

/// Fire-and-forget device operations
pub trait HomeActuators {
    fn lights_on(&mut self) -> Result<()>;
    fn lights_off(&mut self) -> Result<()>;
    fn set_temperature(&mut self, degrees: f32) -> Result<()>;
    fn play(&mut self, source: &str) -> Result<()>;
    fn stop_music(&mut self) -> Result<()>;
    fn unlock_door(&mut self) -> Result<()>;
    fn lock_door(&mut self) -> Result<()>;
    fn display(&mut self, page: &str) -> Result<()>;
    fn sleep_mode(&mut self) -> Result<()>;
}

/// Run a command against the actuators
pub fn execute(home: &mut dyn HomeActuators, command: HomeCommand) -> Result<()> {
    match command {
        HomeCommand::LightsOn => home.lights_on(),
        HomeCommand::LightsOff => home.lights_off(),
        HomeCommand::SetTemperature(degrees) => home.set_temperature(degrees),
        HomeCommand::PlayMusic => home.play(MUSIC_SOURCE),
        HomeCommand::StopMusic => home.stop_music(),
        HomeCommand::OpenDoor => home.unlock_door(),
        HomeCommand::CloseDoor => home.lock_door(),
        HomeCommand::ShowWeather => home.display(WEATHER_PAGE),
        HomeCommand::ShowNews => home.display(NEWS_PAGE),
        HomeCommand::GoodNight => home.sleep_mode(),
    }
}

/// Actuator backend that only records requests in the log
///
/// Lighting goes to the bridge address, everything else to the hub.
pub struct DryRunHome {
    hub: IpAddr,
    bridge: IpAddr,
    requests: u64,
}

impl DryRunHome {
    pub fn new(hub: IpAddr, bridge: IpAddr) -> Self {
        info!("Home hub at {}, lighting bridge at {}", hub, bridge);
        Self {
            hub,
            bridge,
            requests: 0,
        }
    }

    /// Number of requests issued so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    fn hub(&mut self, action: &str) -> Result<()> {
        self.requests += 1;
        info!(target: "smart_home_bci::hub", "{} <- {}", self.hub, action);
        Ok(())
    }

    fn bridge(&mut self, action: &str) -> Result<()> {
        self.requests += 1;
        info!(target: "smart_home_bci::bridge", "{} <- {}", self.bridge, action);
        Ok(())
    }
}

impl HomeActuators for DryRunHome {
    fn lights_on(&mut self) -> Result<()> {
        self.bridge("lights on")
    }

    fn lights_off(&mut self) -> Result<()> {
        self.bridge("lights off")
    }

    fn set_temperature(&mut self, degrees: f32) -> Result<()> {
        self.hub(&format!("thermostat set {}", degrees))
    }

    fn play(&mut self, source: &str) -> Result<()> {
        self.hub(&format!("speakers play {}", source))
    }

    fn stop_music(&mut self) -> Result<()> {
        self.hub("speakers stop")
    }

    fn unlock_door(&mut self) -> Result<()> {
        self.hub("door unlock")
    }

    fn lock_door(&mut self) -> Result<()> {
        self.hub("door lock")
    }

    fn display(&mut self, page: &str) -> Result<()> {
        self.hub(&format!("screen display {}", page))
    }

    fn sleep_mode(&mut self) -> Result<()> {
        self.hub("mode sleep")
    }
}
