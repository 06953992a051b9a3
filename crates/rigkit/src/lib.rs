//! # rigkit -- Rig Control for Amateur Radio
//!
//! `rigkit` is an asynchronous Rust library for controlling radio
//! transceivers through interchangeable backends, plus the pieces needed
//! to share one radio between applications: a rigctld-compatible wire
//! protocol, a network client backend, and the building blocks of the
//! `rigkitd` control daemon.
//!
//! ## Quick Start
//!
//! Add `rigkit` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rigkit = "0.4"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Open the simulator and read its frequency:
//!
//! ```
//! use rigkit::{default_registry, PortConfig, Vfo};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> rigkit::Result<()> {
//!     let registry = default_registry();
//!     let mut rig = registry.build(rigkit::sim::SIM_MODEL_ID, &PortConfig::default())?;
//!     rig.init().await?;
//!     rig.open().await?;
//!
//!     let freq = rig.get_freq(Vfo::Current).await?;
//!     println!("current VFO: {} Hz", freq);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                         |
//! |------------------------|-------------------------------------------------|
//! | `rigkit-core`          | `Rig` handle, capability tables, dispatch, cache |
//! | `rigkit-transport`     | Serial, TCP, UDP transport implementations       |
//! | `rigkit-wire`          | rigctld-compatible line protocol codec           |
//! | `rigkit-netrig`        | Network client backend (relays to a daemon)      |
//! | `rigkit-sim`           | Simulated in-memory backend                      |
//! | `rigkit-test-harness`  | Mock transports and instrumented backends        |
//! | **`rigkit`**           | This facade crate -- re-exports everything       |
//!
//! All backends implement the [`Backend`] trait and plug into the
//! dispatch core through a [`RigCaps`] capability table, so application
//! code works against [`Rig`] and stays backend-agnostic.

pub use rigkit_core::*;

/// Transport implementations (serial, TCP, UDP).
pub mod transport {
    pub use rigkit_transport::*;
}

/// The rigctld-compatible wire protocol codec.
pub mod wire {
    pub use rigkit_wire::*;
}

/// Network client backend: relays operations to a remote daemon.
pub mod netrig {
    pub use rigkit_netrig::*;
}

/// Simulated in-memory backend.
pub mod sim {
    pub use rigkit_sim::*;
}

/// Build the default model registry.
///
/// Registered models:
///
/// | Id | Model        | Backend                               |
/// |----|--------------|---------------------------------------|
/// | 1  | Simulator    | [`sim::SimRig`] (no hardware needed)  |
/// | 2  | Network rig  | [`netrig::NetRig`] (`host:port` path) |
///
/// Hardware backends register here as they are written; the registry is
/// an explicit value, so embedders can also start from
/// [`Registry::new()`] and register only what they ship.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();

    registry
        .register(
            rigkit_sim::sim_caps(),
            Box::new(|_port| Ok(Box::new(rigkit_sim::SimRig::new()) as Box<dyn Backend>)),
        )
        .expect("simulator model id is unique");

    registry
        .register(
            rigkit_netrig::netrig_caps(),
            Box::new(|port| {
                let netrig = rigkit_netrig::NetRig::new(&port.pathname)
                    .timeout(std::time::Duration::from_millis(port.timeout_ms))
                    .retries(port.retries);
                Ok(Box::new(netrig) as Box<dyn Backend>)
            }),
        )
        .expect("network model id is unique");

    registry
}

/// Enumerate the capability tables of every registered model.
///
/// This is the entry point for applications that need a model picker.
pub fn supported_models() -> Vec<std::sync::Arc<RigCaps>> {
    default_registry().models().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_sim_and_netrig() {
        let registry = default_registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.caps(1).unwrap().model_name, "Simulator");
        assert_eq!(registry.caps(2).unwrap().model_name, "Network rig");
    }

    #[test]
    fn supported_models_ordered() {
        let models = supported_models();
        assert_eq!(models.len(), 2);
        assert!(models[0].model_id < models[1].model_id);
    }

    #[tokio::test]
    async fn build_and_drive_simulator() {
        let registry = default_registry();
        let mut rig = registry
            .build(sim::SIM_MODEL_ID, &PortConfig::default())
            .unwrap();
        rig.init().await.unwrap();
        rig.open().await.unwrap();
        rig.set_freq(Vfo::A, 7_074_000).await.unwrap();
        assert_eq!(rig.get_freq(Vfo::A).await.unwrap(), 7_074_000);
        rig.close().await.unwrap();
        rig.cleanup().await.unwrap();
    }
}
