//! Serial port transport for rig communication.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for USB virtual COM ports and physical RS-232
//! connections, plus explicit RTS/DTR line control for auxiliary PTT
//! keying and CD/CTS sensing for auxiliary DCD.
//!
//! Write pacing: some rigs lose characters when commands arrive
//! back-to-back at high baud rates. [`SerialConfig::write_delay_ms`]
//! paces individual bytes and [`SerialConfig::post_write_delay_ms`] adds
//! a settling delay after each complete command.

use async_trait::async_trait;
use rigkit_core::error::{Error, Result};
use rigkit_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// Serial port configuration.
///
/// Defaults are appropriate for most modern transceivers:
/// 8 data bits, 1 stop bit, no parity, no flow control, no pacing.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (e.g., 9600, 19200, 38400, 115200)
    pub baud_rate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1)
    pub stop_bits: StopBits,
    /// Parity checking (typically None)
    pub parity: Parity,
    /// Flow control (typically None)
    pub flow_control: FlowControl,
    /// Delay between individual bytes during a write (0 = none).
    pub write_delay_ms: u64,
    /// Delay after each complete write (0 = none).
    pub post_write_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            write_delay_ms: 0,
            post_write_delay_ms: 0,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial port transport for rig communication.
pub struct SerialTransport {
    /// The underlying serial port stream, `None` after `close()`.
    port: Option<SerialStream>,
    /// Port name for logging/debugging.
    port_name: String,
    write_delay_ms: u64,
    post_write_delay_ms: u64,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and default settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate (e.g., 9600, 19200, 38400, 115200)
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let mut serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Io(format!("failed to open serial port {port}: {e}"))
            })?;

        // De-assert DTR and RTS immediately after opening.
        //
        // Many transceivers route DTR/RTS to CW key and/or PTT inputs.
        // If the OS asserts DTR on open (common default), the radio will
        // interpret it as key-down and produce a continuous sidetone.
        if let Err(e) = serial_stream.write_data_terminal_ready(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert DTR");
        }
        if let Err(e) = serial_stream.write_request_to_send(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert RTS");
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "Serial port opened");

        Ok(Self {
            port: Some(serial_stream),
            port_name: port.to_string(),
            write_delay_ms: config.write_delay_ms,
            post_write_delay_ms: config.post_write_delay_ms,
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port_mut(&mut self) -> Result<&mut SerialStream> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Io("serial port not open".into()))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let write_delay = self.write_delay_ms;
        let post_delay = self.post_write_delay_ms;
        let name = self.port_name.clone();
        let port = self.port_mut()?;

        tracing::trace!(port = %name, bytes = data.len(), data = ?data, "Sending data");

        if write_delay > 0 {
            // Paced write: one byte at a time with an inter-byte delay.
            for byte in data {
                port.write_all(std::slice::from_ref(byte))
                    .await
                    .map_err(|e| Error::Io(format!("serial write on {name}: {e}")))?;
                tokio::time::sleep(Duration::from_millis(write_delay)).await;
            }
        } else {
            port.write_all(data)
                .await
                .map_err(|e| Error::Io(format!("serial write on {name}: {e}")))?;
        }

        port.flush()
            .await
            .map_err(|e| Error::Io(format!("serial flush on {name}: {e}")))?;

        if post_delay > 0 {
            tokio::time::sleep(Duration::from_millis(post_delay)).await;
        }

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let name = self.port_name.clone();
        let port = self.port_mut()?;

        let result = tokio::time::timeout(timeout, port.read(buf)).await;

        match result {
            Ok(Ok(n)) => {
                tracing::trace!(port = %name, bytes = n, "Received data");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %name, error = %e, "Failed to receive data");
                Err(Error::Io(format!("serial read on {name}: {e}")))
            }
            Err(_) => {
                tracing::trace!(port = %name, timeout_ms = timeout.as_millis(), "Read timeout");
                Err(Error::Timeout)
            }
        }
    }

    async fn flush_input(&mut self) -> Result<()> {
        let name = self.port_name.clone();
        let port = self.port_mut()?;
        port.clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| Error::Io(format!("serial input flush on {name}: {e}")))
    }

    async fn set_rts(&mut self, on: bool) -> Result<()> {
        let name = self.port_name.clone();
        let port = self.port_mut()?;
        port.write_request_to_send(on)
            .map_err(|e| Error::Io(format!("RTS on {name}: {e}")))
    }

    async fn set_dtr(&mut self, on: bool) -> Result<()> {
        let name = self.port_name.clone();
        let port = self.port_mut()?;
        port.write_data_terminal_ready(on)
            .map_err(|e| Error::Io(format!("DTR on {name}: {e}")))
    }

    async fn read_cd(&mut self) -> Result<bool> {
        let name = self.port_name.clone();
        let port = self.port_mut()?;
        port.read_carrier_detect()
            .map_err(|e| Error::Io(format!("CD on {name}: {e}")))
    }

    async fn read_cts(&mut self) -> Result<bool> {
        let name = self.port_name.clone();
        let port = self.port_mut()?;
        port.read_clear_to_send()
            .map_err(|e| Error::Io(format!("CTS on {name}: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");
            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.write_delay_ms, 0);
        assert_eq!(config.post_write_delay_ms, 0);
    }

    #[test]
    fn data_bits_conversion() {
        let _: tokio_serial::DataBits = DataBits::Five.into();
        let _: tokio_serial::DataBits = DataBits::Six.into();
        let _: tokio_serial::DataBits = DataBits::Seven.into();
        let _: tokio_serial::DataBits = DataBits::Eight.into();
    }

    #[test]
    fn stop_bits_conversion() {
        let _: tokio_serial::StopBits = StopBits::One.into();
        let _: tokio_serial::StopBits = StopBits::Two.into();
    }

    #[test]
    fn parity_conversion() {
        let _: tokio_serial::Parity = Parity::None.into();
        let _: tokio_serial::Parity = Parity::Odd.into();
        let _: tokio_serial::Parity = Parity::Even.into();
    }

    #[test]
    fn flow_control_conversion() {
        let _: tokio_serial::FlowControl = FlowControl::None.into();
        let _: tokio_serial::FlowControl = FlowControl::Software.into();
        let _: tokio_serial::FlowControl = FlowControl::Hardware.into();
    }
}
