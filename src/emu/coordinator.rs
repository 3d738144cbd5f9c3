use std::fmt;

use crate::plat::Register;

use super::{bus::Bus, machine::Datapath, observer::CycleObserver, EResult};

/// A handle to one bus participant of the [`Datapath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusNode {
    Reg(Register),
    /// The memory cell selected by MA.
    Memory,
    /// The output bus data input.
    OutputData,
}

impl fmt::Display for BusNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reg(reg) => write!(f, "{reg}"),
            Self::Memory => write!(f, "MEM"),
            Self::OutputData => write!(f, "OD"),
        }
    }
}

/// Collects the nodes marked for one cycle and performs the bus transfer between them.
#[derive(Debug, Default, Clone)]
pub struct TransmissionCoordinator {
    transmitters: Vec<BusNode>,
    receivers: Vec<BusNode>,
}

impl TransmissionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `node` to drive the bus this cycle.
    ///
    /// # Errors
    ///
    /// Fails with [`EmuError::ReadForbidden`][super::EmuError::ReadForbidden] if the node cannot
    /// transmit. Nothing is noted in that case.
    pub fn note_for_transmission(&mut self, datapath: &mut Datapath, node: BusNode) -> EResult<()> {
        datapath.node_mut(node).mark_transmit()?;
        self.transmitters.push(node);
        Ok(())
    }

    /// Marks `node` to latch the bus value this cycle.
    pub fn note_for_reception(&mut self, datapath: &mut Datapath, node: BusNode) {
        datapath.node_mut(node).mark_receive();
        self.receivers.push(node);
    }

    /// Resolves every transmitter, then every receiver, and forgets them.
    ///
    /// On error the remaining markings are dropped as well, so a failed cycle leaves no node
    /// marked.
    pub fn execute(
        &mut self,
        datapath: &mut Datapath,
        bus: &mut Bus,
        observer: &mut dyn CycleObserver,
    ) -> EResult<()> {
        let result = self.transfer(datapath, bus);
        match &result {
            Ok(()) if !self.is_idle() => {
                let value = bus.receive().unwrap_or_default();
                observer.bus_transfer(self.transmitters.first().copied(), &self.receivers, value);
            }
            Ok(()) => {}
            Err(e) => observer.error(e),
        }
        self.abort(datapath);
        result
    }

    /// Drops every noted node and its marking without touching the bus.
    pub fn abort(&mut self, datapath: &mut Datapath) {
        for &node in self.transmitters.iter().chain(&self.receivers) {
            datapath.node_mut(node).unmark();
        }
        self.clear();
    }

    fn transfer(&self, datapath: &mut Datapath, bus: &mut Bus) -> EResult<()> {
        for &node in &self.transmitters {
            datapath.node_mut(node).resolve_cycle(bus)?;
        }
        for &node in &self.receivers {
            datapath.node_mut(node).resolve_cycle(bus)?;
        }
        Ok(())
    }

    /// Whether a transmitter is noted for this cycle.
    pub fn bus_in_use(&self) -> bool {
        !self.transmitters.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.transmitters.is_empty() && self.receivers.is_empty()
    }

    pub fn clear(&mut self) {
        self.transmitters.clear();
        self.receivers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::{observer::LogObserver, EmuError};

    #[test]
    fn test_one_transmitter_many_receivers() {
        let mut dp = Datapath::new();
        let mut bus = Bus::new();
        let mut coord = TransmissionCoordinator::new();
        dp.set(Register::A, 0x5A);
        coord
            .note_for_transmission(&mut dp, BusNode::Reg(Register::A))
            .unwrap();
        coord.note_for_reception(&mut dp, BusNode::Reg(Register::B));
        coord.note_for_reception(&mut dp, BusNode::Reg(Register::X));
        coord.note_for_reception(&mut dp, BusNode::Reg(Register::MA));
        assert!(coord.bus_in_use());
        coord.execute(&mut dp, &mut bus, &mut LogObserver).unwrap();
        assert_eq!(dp.get(Register::B), 0x5A);
        assert_eq!(dp.get(Register::X), 0x5A);
        assert_eq!(dp.get(Register::MA), 0x5A);
        assert!(coord.is_idle());
        assert!(dp.active_nodes().is_empty());
    }

    #[test]
    fn test_two_transmitters_conflict() {
        let mut dp = Datapath::new();
        let mut bus = Bus::new();
        let mut coord = TransmissionCoordinator::new();
        dp.set(Register::A, 1);
        dp.set(Register::B, 2);
        coord
            .note_for_transmission(&mut dp, BusNode::Reg(Register::A))
            .unwrap();
        coord
            .note_for_transmission(&mut dp, BusNode::Reg(Register::B))
            .unwrap();
        coord.note_for_reception(&mut dp, BusNode::Reg(Register::X));
        assert_eq!(
            coord.execute(&mut dp, &mut bus, &mut LogObserver),
            Err(EmuError::BusConflict {
                held: 1,
                rejected: 2
            })
        );
        // the receiver never ran, and no marking survives
        assert_eq!(dp.get(Register::X), 0);
        assert!(dp.active_nodes().is_empty());
        assert!(coord.is_idle());
    }

    #[test]
    fn test_receiver_without_transmitter() {
        let mut dp = Datapath::new();
        let mut bus = Bus::new();
        let mut coord = TransmissionCoordinator::new();
        coord.note_for_reception(&mut dp, BusNode::Memory);
        assert_eq!(
            coord.execute(&mut dp, &mut bus, &mut LogObserver),
            Err(EmuError::BusUnwritten)
        );
    }

    #[test]
    fn test_forbidden_transmitter_not_noted() {
        let mut dp = Datapath::new();
        let mut coord = TransmissionCoordinator::new();
        assert_eq!(
            coord.note_for_transmission(&mut dp, BusNode::Reg(Register::IP)),
            Err(EmuError::ReadForbidden("IP"))
        );
        assert!(coord.is_idle());
    }
}
