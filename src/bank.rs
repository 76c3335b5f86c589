//! Register bank: the four Modbus address spaces
//!
//! Borrowed by the slave for the duration of one poll call, never retained.
//! Region sizes are whatever the host passes in; addressing is by raw Modbus
//! address with no offsetting. Read-only regions (discrete inputs, input
//! registers) are shared borrows, so a slave cannot mutate them by
//! construction.
//!
//! All accessors bounds-check before touching the data and report
//! [`ExceptionCode::IllegalDataAddress`] for ranges that fall outside
//! `[0, size)`; validation always precedes mutation.

use crate::error::{ExceptionCode, ModbusError, ModbusResult};

/// The four logical address spaces of a slave, borrowed per poll.
pub struct RegisterBank<'a> {
    /// DO: coils, read/write bits.
    coils: &'a mut [bool],
    /// DI: discrete inputs, read-only bits.
    discrete_inputs: &'a [bool],
    /// AI: input registers, read-only words.
    input_registers: &'a [u16],
    /// AO: holding registers, read/write words.
    holding_registers: &'a mut [u16],
}

#[inline]
fn check_range(size: usize, start: u16, quantity: u16) -> ModbusResult<()> {
    if usize::from(start) + usize::from(quantity) > size {
        return Err(ModbusError::exception(ExceptionCode::IllegalDataAddress));
    }
    Ok(())
}

impl<'a> RegisterBank<'a> {
    /// Borrow the four regions: coils (DO), discrete inputs (DI), input
    /// registers (AI), holding registers (AO).
    pub fn new(
        coils: &'a mut [bool],
        discrete_inputs: &'a [bool],
        input_registers: &'a [u16],
        holding_registers: &'a mut [u16],
    ) -> Self {
        Self {
            coils,
            discrete_inputs,
            input_registers,
            holding_registers,
        }
    }

    // ========================================================================
    // Block reads (FC01-FC04)
    // ========================================================================

    /// Coils `start .. start + quantity` (FC01).
    pub fn coils(&self, start: u16, quantity: u16) -> ModbusResult<&[bool]> {
        check_range(self.coils.len(), start, quantity)?;
        Ok(&self.coils[usize::from(start)..usize::from(start) + usize::from(quantity)])
    }

    /// Discrete inputs `start .. start + quantity` (FC02).
    pub fn discrete_inputs(&self, start: u16, quantity: u16) -> ModbusResult<&[bool]> {
        check_range(self.discrete_inputs.len(), start, quantity)?;
        Ok(&self.discrete_inputs[usize::from(start)..usize::from(start) + usize::from(quantity)])
    }

    /// Holding registers `start .. start + quantity` (FC03).
    pub fn holding_registers(&self, start: u16, quantity: u16) -> ModbusResult<&[u16]> {
        check_range(self.holding_registers.len(), start, quantity)?;
        Ok(&self.holding_registers[usize::from(start)..usize::from(start) + usize::from(quantity)])
    }

    /// Input registers `start .. start + quantity` (FC04).
    pub fn input_registers(&self, start: u16, quantity: u16) -> ModbusResult<&[u16]> {
        check_range(self.input_registers.len(), start, quantity)?;
        Ok(&self.input_registers[usize::from(start)..usize::from(start) + usize::from(quantity)])
    }

    // ========================================================================
    // Writes (FC05, FC06, FC15, FC16)
    // ========================================================================

    /// Write one coil (FC05).
    pub fn set_coil(&mut self, address: u16, value: bool) -> ModbusResult<()> {
        if usize::from(address) >= self.coils.len() {
            return Err(ModbusError::exception(ExceptionCode::IllegalDataAddress));
        }
        self.coils[usize::from(address)] = value;
        Ok(())
    }

    /// Write one holding register (FC06).
    pub fn set_holding_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        if usize::from(address) >= self.holding_registers.len() {
            return Err(ModbusError::exception(ExceptionCode::IllegalDataAddress));
        }
        self.holding_registers[usize::from(address)] = value;
        Ok(())
    }

    /// Mutable coil block for FC15; checked before any bit is written.
    pub fn coils_mut(&mut self, start: u16, quantity: u16) -> ModbusResult<&mut [bool]> {
        check_range(self.coils.len(), start, quantity)?;
        Ok(&mut self.coils[usize::from(start)..usize::from(start) + usize::from(quantity)])
    }

    /// Mutable holding-register block for FC16.
    pub fn holding_registers_mut(&mut self, start: u16, quantity: u16) -> ModbusResult<&mut [u16]> {
        check_range(self.holding_registers.len(), start, quantity)?;
        Ok(&mut self.holding_registers
            [usize::from(start)..usize::from(start) + usize::from(quantity)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_regions() -> (Vec<bool>, Vec<bool>, Vec<u16>, Vec<u16>) {
        (
            vec![false; 16],          // DO
            vec![true, false, true],  // DI
            vec![100, 200, 300, 400], // AI
            vec![0; 10],              // AO
        )
    }

    #[test]
    fn test_block_reads_in_range() {
        let (mut coils, di, ai, mut ao) = sample_regions();
        ao[3] = 0xBEEF;
        let bank = RegisterBank::new(&mut coils, &di, &ai, &mut ao);

        assert_eq!(bank.discrete_inputs(0, 3).unwrap(), &[true, false, true]);
        assert_eq!(bank.input_registers(1, 2).unwrap(), &[200, 300]);
        assert_eq!(bank.holding_registers(3, 1).unwrap(), &[0xBEEF]);
        assert_eq!(bank.coils(0, 16).unwrap().len(), 16);
    }

    #[test]
    fn test_range_past_end_is_illegal_address() {
        let (mut coils, di, ai, mut ao) = sample_regions();
        let bank = RegisterBank::new(&mut coils, &di, &ai, &mut ao);

        assert_eq!(
            bank.coils(10, 7),
            Err(ModbusError::exception(ExceptionCode::IllegalDataAddress))
        );
        assert_eq!(
            bank.holding_registers(0xFF, 1),
            Err(ModbusError::exception(ExceptionCode::IllegalDataAddress))
        );
        // Exactly at the end is fine
        assert!(bank.coils(10, 6).is_ok());
    }

    #[test]
    fn test_single_writes() {
        let (mut coils, di, ai, mut ao) = sample_regions();
        let mut bank = RegisterBank::new(&mut coils, &di, &ai, &mut ao);

        bank.set_coil(12, true).unwrap();
        bank.set_holding_register(1, 0x0003).unwrap();

        assert_eq!(
            bank.set_coil(16, true),
            Err(ModbusError::exception(ExceptionCode::IllegalDataAddress))
        );
        assert_eq!(
            bank.set_holding_register(10, 1),
            Err(ModbusError::exception(ExceptionCode::IllegalDataAddress))
        );

        drop(bank);
        assert!(coils[0x0C]);
        assert_eq!(ao[1], 0x0003);
    }

    #[test]
    fn test_failed_range_leaves_bank_untouched() {
        let (mut coils, di, ai, mut ao) = sample_regions();
        let mut bank = RegisterBank::new(&mut coils, &di, &ai, &mut ao);

        assert!(bank.holding_registers_mut(8, 3).is_err());
        assert!(bank.coils_mut(15, 2).is_err());

        drop(bank);
        assert!(ao.iter().all(|&w| w == 0));
        assert!(coils.iter().all(|&c| !c));
    }
}
