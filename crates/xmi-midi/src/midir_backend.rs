//! midir-based MIDI output backend.

use midir::{MidiOutput, MidiOutputConnection};

use crate::sink::{MidiError, MidiSink};

/// MIDI output over a midir port connection.
pub struct MidirOutput {
    connection: MidiOutputConnection,
    pub port_name: String,
}

impl MidirOutput {
    /// Names of the available output ports, in port order.
    pub fn ports() -> Result<Vec<String>, MidiError> {
        let out = MidiOutput::new("xmiplay")
            .map_err(|e| MidiError::Connect(e.to_string()))?;
        Ok(out
            .ports()
            .iter()
            .map(|p| out.port_name(p).unwrap_or_else(|_| "unknown".to_string()))
            .collect())
    }

    /// Connect to an output port by index, or to the first port.
    pub fn connect(port_index: Option<usize>) -> Result<Self, MidiError> {
        let out = MidiOutput::new("xmiplay")
            .map_err(|e| MidiError::Connect(e.to_string()))?;
        let ports = out.ports();
        if ports.is_empty() {
            return Err(MidiError::NoPort);
        }
        let port = ports.get(port_index.unwrap_or(0)).ok_or(MidiError::NoPort)?;
        let port_name = out
            .port_name(port)
            .unwrap_or_else(|_| "unknown".to_string());
        let connection = out
            .connect(port, "xmiplay-out")
            .map_err(|e| MidiError::Connect(e.to_string()))?;
        Ok(Self { connection, port_name })
    }
}

impl MidiSink for MidirOutput {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        self.connection
            .send(message)
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}
