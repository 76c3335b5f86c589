//! Modbus RTU protocol engine
//!
//! One [`ModbusRtu`] instance is either the single bus master or one slave,
//! selected by the configured unit id (0 = master). Both roles share the
//! frame pipeline: bytes are assembled under the T3.5 silence rule, checked
//! against the CRC, validated, dispatched, and the reply is written back
//! through the same fixed frame buffer.
//!
//! # Execution model
//!
//! The engine is a cooperative state machine. It owns no timebase and spawns
//! nothing; progress happens only inside [`query`](ModbusRtu::query),
//! [`master_poll`](ModbusRtu::master_poll),
//! [`slave_poll`](ModbusRtu::slave_poll) and
//! [`slave_poll_irq`](ModbusRtu::slave_poll_irq), and the only blocking
//! calls are the port's `tx_write`/`tx_drain`.
//!
//! # Example
//!
//! ```rust
//! use voltage_rtu::{ModbusConfig, ModbusPort, ModbusRtu, RegisterBank};
//!
//! // A do-nothing port; real hosts wrap a UART here.
//! struct NullPort;
//! impl ModbusPort for NullPort {
//!     fn rx_ready(&mut self) -> usize { 0 }
//!     fn rx_pop(&mut self) -> u8 { 0 }
//!     fn tx_write(&mut self, _bytes: &[u8]) {}
//!     fn tx_drain(&mut self) {}
//!     fn now_ms(&self) -> u32 { 0 }
//! }
//!
//! let config = ModbusConfig::slave(17).unwrap();
//! let mut engine = ModbusRtu::new(NullPort, config);
//! engine.start();
//!
//! let mut coils = [false; 32];
//! let discrete = [false; 8];
//! let inputs = [0u16; 8];
//! let mut holding = [0u16; 64];
//! let mut bank = RegisterBank::new(&mut coils, &discrete, &inputs, &mut holding);
//! assert_eq!(engine.slave_poll(&mut bank).unwrap(), 0); // nothing pending
//! ```

use tracing::{debug, trace, warn};

use crate::bank::RegisterBank;
use crate::config::{ModbusConfig, TxEnableMode};
use crate::constants::{
    BROADCAST_ADDRESS, DIAG_SUB_RESTART, EXCEPTION_FRAME_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS,
    MAX_SLAVE_ADDRESS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS, MIN_REQUEST_SIZE, MIN_RESPONSE_SIZE,
    POS_ADDR_HI, POS_BYTE_CNT, POS_QTY_HI,
};
use crate::crc;
use crate::error::{ExceptionCode, ModbusError, ModbusResult};
use crate::frame::FrameBuffer;
use crate::port::{Direction, ModbusPort};
use crate::protocol::{FunctionCode, SlaveId, Telegram};
use crate::stats::CommStats;

/// Master session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to accept a new query.
    Idle,
    /// A query is on the wire; awaiting the reply or the timeout.
    Waiting,
}

/// Bidirectional Modbus RTU engine over a [`ModbusPort`].
pub struct ModbusRtu<P: ModbusPort> {
    port: P,
    config: ModbusConfig,
    frame: FrameBuffer,
    state: SessionState,
    last_error: Option<ModbusError>,
    stats: CommStats,
    /// Last sampled `rx_ready` count (polled T3.5 assembly).
    last_rx_count: usize,
    /// Timestamp of the last observed RX activity.
    last_byte_ms: u32,
    /// Write cursor of the interrupt-driven assembly variant.
    irq_cursor: usize,
    /// Master: telegram awaiting its reply.
    pending: Option<Telegram>,
    /// Master: transmit completion time, anchor for the response timeout.
    last_tx_ms: u32,
    /// Slave: time of the last successfully processed request.
    last_request_ms: u32,
    watchdog_primed: bool,
    restart_hook: Option<Box<dyn FnMut()>>,
}

impl<P: ModbusPort> ModbusRtu<P> {
    /// Create an engine over `port` with the given configuration.
    pub fn new(port: P, config: ModbusConfig) -> Self {
        Self {
            port,
            config,
            frame: FrameBuffer::new(),
            state: SessionState::Idle,
            last_error: None,
            stats: CommStats::new(),
            last_rx_count: 0,
            last_byte_ms: 0,
            irq_cursor: 0,
            pending: None,
            last_tx_ms: 0,
            last_request_ms: 0,
            watchdog_primed: false,
            restart_hook: None,
        }
    }

    /// Flush stale port bytes and return the session to a clean IDLE state.
    ///
    /// Counters are zeroed. Call once after the port is up, or at any time
    /// to abort an outstanding master query.
    pub fn start(&mut self) {
        while self.port.rx_ready() > 0 {
            let _ = self.port.rx_pop();
        }
        if self.config.txen_mode == TxEnableMode::Pin {
            self.port.set_direction(Direction::Rx);
        }
        self.frame.reset();
        self.irq_cursor = 0;
        self.last_rx_count = 0;
        self.state = SessionState::Idle;
        self.pending = None;
        self.stats = CommStats::new();
        self.last_error = None;
    }

    // ========================================================================
    // Introspection and runtime adjustment
    // ========================================================================

    /// Current master session state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last error recorded by the protocol processor, if any.
    #[inline]
    pub fn last_error(&self) -> Option<&ModbusError> {
        self.last_error.as_ref()
    }

    /// Communication counters.
    #[inline]
    pub fn stats(&self) -> CommStats {
        self.stats
    }

    /// Own unit id (0 = master).
    #[inline]
    pub fn unit_id(&self) -> SlaveId {
        self.config.unit_id
    }

    /// Re-address a slave at runtime. Only 1..=247 are assignable.
    pub fn set_unit_id(&mut self, unit_id: SlaveId) -> ModbusResult<()> {
        if unit_id == BROADCAST_ADDRESS || unit_id > MAX_SLAVE_ADDRESS {
            return Err(ModbusError::InvalidSlaveId { id: unit_id });
        }
        self.config.unit_id = unit_id;
        Ok(())
    }

    /// Adjust the response timeout / watchdog period.
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.config.timeout_ms = timeout_ms;
    }

    /// Adjust the post-drain busy-wait count.
    pub fn set_overtime_ticks(&mut self, ticks: u32) {
        self.config.overtime_ticks = ticks;
    }

    /// Install the hook fired by FC08 sub-function 1 (device restart).
    pub fn set_restart_hook<F: FnMut() + 'static>(&mut self, hook: F) {
        self.restart_hook = Some(Box::new(hook));
    }

    /// Whether the time since the last successfully processed request
    /// exceeds the configured timeout. Hosts use this to fail outputs safe.
    pub fn watchdog_expired(&self) -> bool {
        if !self.watchdog_primed {
            return true;
        }
        self.port.now_ms().wrapping_sub(self.last_request_ms) > self.config.timeout_ms
    }

    /// Borrow the underlying port.
    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the underlying port.
    #[inline]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    // ========================================================================
    // Master: query submission
    // ========================================================================

    /// Submit a master query described by `telegram`.
    ///
    /// `image` supplies the data for write functions: the single value in
    /// word 0 for FC05/FC06, `quantity` words for FC16, and packed coils
    /// (16 per word, little-endian) for FC15. Read functions ignore it at
    /// submission; the same image is filled by
    /// [`master_poll`](Self::master_poll) when the reply arrives.
    ///
    /// Accepted only when the engine is configured as master and IDLE.
    /// Broadcast (id 0) is transmitted like any other query; no reply will
    /// arrive, so the session returns to IDLE via the timeout.
    pub fn query(&mut self, telegram: &Telegram, image: &[u16]) -> ModbusResult<()> {
        if !self.config.is_master() {
            return Err(ModbusError::NotMaster);
        }
        if self.state != SessionState::Idle {
            return Err(ModbusError::Busy);
        }
        telegram.validate_id()?;
        let needed = telegram.image_words();
        if image.len() < needed {
            return Err(ModbusError::ImageTooSmall {
                needed,
                len: image.len(),
            });
        }

        self.encode_request(telegram, image)?;
        self.send_frame()?;
        self.state = SessionState::Waiting;
        self.pending = Some(*telegram);
        self.last_error = None;
        debug!(
            slave = telegram.slave_id,
            function = telegram.function.description(),
            address = telegram.address,
            quantity = telegram.quantity,
            "query transmitted"
        );
        Ok(())
    }

    fn encode_request(&mut self, telegram: &Telegram, image: &[u16]) -> ModbusResult<()> {
        self.frame.reset();
        self.frame.push(telegram.slave_id)?;
        self.frame.push(telegram.function.to_u8())?;
        self.frame.push_u16(telegram.address)?;

        match telegram.function {
            FunctionCode::ReadCoils
            | FunctionCode::ReadDiscreteInputs
            | FunctionCode::ReadHoldingRegisters
            | FunctionCode::ReadInputRegisters => {
                self.frame.push_u16(telegram.quantity)?;
            }
            FunctionCode::WriteSingleCoil => {
                let value = if image[0] != 0 {
                    crate::constants::COIL_ON
                } else {
                    crate::constants::COIL_OFF
                };
                self.frame.push_u16(value)?;
            }
            FunctionCode::WriteSingleRegister => {
                self.frame.push_u16(image[0])?;
            }
            FunctionCode::Diagnostics => {
                // Sub-function travels in the address field; data is zero.
                self.frame.push_u16(0)?;
            }
            FunctionCode::WriteMultipleCoils => {
                let byte_count = usize::from(telegram.quantity).div_ceil(8);
                self.frame.push_u16(telegram.quantity)?;
                self.frame.push(byte_count as u8)?;
                for i in 0..byte_count {
                    // Low-coil-first: byte i carries coils i*8 .. i*8+7,
                    // i.e. the low or high half of image word i/2.
                    let byte = (image[i / 2] >> (8 * (i % 2))) as u8;
                    self.frame.push(byte)?;
                }
            }
            FunctionCode::WriteMultipleRegisters => {
                let byte_count = usize::from(telegram.quantity) * 2;
                self.frame.push_u16(telegram.quantity)?;
                self.frame.push(byte_count as u8)?;
                for &word in &image[..usize::from(telegram.quantity)] {
                    self.frame.push_u16(word)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Master: response collection
    // ========================================================================

    /// Collect the reply to the outstanding query. Call repeatedly from the
    /// host loop.
    ///
    /// Returns `Ok(0)` while nothing is pending or the frame is still being
    /// assembled, `Ok(n)` once an `n`-byte reply has been decoded into
    /// `image`, and an error when the query concluded without a usable
    /// reply. Any conclusive outcome returns the session to IDLE.
    pub fn master_poll(&mut self, image: &mut [u16]) -> ModbusResult<usize> {
        if !self.config.is_master() {
            return Err(ModbusError::NotMaster);
        }
        if self.state != SessionState::Waiting {
            return Ok(0);
        }

        let now = self.port.now_ms();
        if now.wrapping_sub(self.last_tx_ms) > self.config.timeout_ms {
            self.state = SessionState::Idle;
            self.pending = None;
            debug!("response timeout");
            return self.fail(ModbusError::NoReply);
        }

        let len = match self.poll_rx_frame() {
            Ok(None) => return Ok(0),
            Ok(Some(len)) => len,
            Err(error) => {
                // Overflow: the reply is unusable, give up on the query.
                self.state = SessionState::Idle;
                self.pending = None;
                self.last_error = Some(error.clone());
                return Err(error);
            }
        };

        self.state = SessionState::Idle;
        let telegram = match self.pending.take() {
            Some(telegram) => telegram,
            None => return Ok(0),
        };

        // Exception replies are 5 bytes and must still be decoded, so the
        // 6-byte minimum for data replies is enforced after validation.
        if len < EXCEPTION_FRAME_SIZE {
            return self.fail(ModbusError::FrameTooShort { len });
        }
        if let Err(error) = self.validate_answer() {
            return self.fail(error);
        }
        if len < MIN_RESPONSE_SIZE {
            return self.fail(ModbusError::FrameTooShort { len });
        }
        if let Err(error) = self.decode_response(&telegram, image) {
            self.last_error = Some(error.clone());
            return Err(error);
        }

        self.last_error = None;
        Ok(len)
    }

    /// Validate a received reply: CRC, exception flag, function whitelist.
    fn validate_answer(&self) -> ModbusResult<()> {
        if let Err(error) = crc::verify(self.frame.as_slice()) {
            debug!(%error, "reply failed CRC");
            return Err(ModbusError::NoReply);
        }
        if self.frame.is_exception() {
            return Err(ModbusError::RemoteException {
                function: self.frame.function() & 0x7F,
                code: self.frame.get(2),
            });
        }
        FunctionCode::from_u8(self.frame.function())?;
        Ok(())
    }

    /// Deliver the validated reply into the caller's register image.
    fn decode_response(&mut self, telegram: &Telegram, image: &mut [u16]) -> ModbusResult<()> {
        match telegram.function {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
                let byte_count = usize::from(self.frame.get(2));
                if self.frame.len() < byte_count + 5 {
                    return Err(ModbusError::FrameTooShort {
                        len: self.frame.len(),
                    });
                }
                let words = byte_count.div_ceil(2);
                if image.len() < words {
                    return Err(ModbusError::ImageTooSmall {
                        needed: words,
                        len: image.len(),
                    });
                }
                // Byte k carries coils k*8 .. k*8+7, landing in the low or
                // high half of word k/2.
                for k in 0..byte_count {
                    let byte = u16::from(self.frame.get(3 + k));
                    if k % 2 == 0 {
                        image[k / 2] = byte;
                    } else {
                        image[k / 2] |= byte << 8;
                    }
                }
            }
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                let byte_count = usize::from(self.frame.get(2));
                if self.frame.len() < byte_count + 5 {
                    return Err(ModbusError::FrameTooShort {
                        len: self.frame.len(),
                    });
                }
                let words = byte_count / 2;
                if image.len() < words {
                    return Err(ModbusError::ImageTooSmall {
                        needed: words,
                        len: image.len(),
                    });
                }
                for i in 0..words {
                    image[i] = self.frame.u16_at(3 + 2 * i);
                }
            }
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => {
                if image.is_empty() {
                    return Err(ModbusError::ImageTooSmall { needed: 1, len: 0 });
                }
                image[0] = self.frame.u16_at(4);
            }
            FunctionCode::Diagnostics
            | FunctionCode::WriteMultipleCoils
            | FunctionCode::WriteMultipleRegisters => {}
        }
        Ok(())
    }

    // ========================================================================
    // Slave: request handling
    // ========================================================================

    /// Service one incoming request, if a complete frame is pending.
    ///
    /// The register bank is borrowed for this call only. Returns `Ok(0)`
    /// when no frame is ready or the frame is addressed elsewhere, `Ok(n)`
    /// after an `n`-byte request was executed (and answered, unless it was
    /// a broadcast), or the error that was encoded into the exception reply.
    pub fn slave_poll(&mut self, bank: &mut RegisterBank<'_>) -> ModbusResult<usize> {
        if self.config.is_master() {
            warn!("slave_poll invoked on a master engine");
            return Ok(0);
        }
        let len = match self.poll_rx_frame() {
            Ok(None) => return Ok(0),
            Ok(Some(len)) => len,
            Err(error) => {
                self.last_error = Some(error.clone());
                return Err(error);
            }
        };
        self.process_request(len, bank)
    }

    /// Interrupt-driven receive variant: consume exactly one pending byte.
    ///
    /// Call from the UART RX interrupt (or a tight loop standing in for
    /// one). A gap longer than T3.5 discards the partial frame; a frame is
    /// executed as soon as its final byte arrives, without waiting for the
    /// closing silence.
    pub fn slave_poll_irq(&mut self, bank: &mut RegisterBank<'_>) -> ModbusResult<usize> {
        if self.config.is_master() {
            warn!("slave_poll_irq invoked on a master engine");
            return Ok(0);
        }
        if self.port.rx_ready() == 0 {
            return Ok(0);
        }

        let now = self.port.now_ms();
        if now.wrapping_sub(self.last_byte_ms) > self.config.t35_ms && self.irq_cursor != 0 {
            trace!(discarded = self.irq_cursor, "inter-byte gap, frame restart");
            self.irq_cursor = 0;
        }
        self.last_byte_ms = now;

        let byte = self.port.rx_pop();
        if self.irq_cursor == 0 {
            self.frame.reset();
        }
        if self.frame.push(byte).is_err() {
            self.irq_cursor = 0;
            self.frame.reset();
            self.stats.inc_err();
            return self.fail_quiet(ModbusError::BufferOverflow);
        }
        self.irq_cursor = self.frame.len();

        // Frame-complete heuristic: fixed 8-byte requests, or the byte
        // count plus framing for the variable-length FC15/FC16.
        let cursor = self.irq_cursor;
        if cursor < MIN_REQUEST_SIZE {
            return Ok(0);
        }
        let func = self.frame.function();
        if (func == FunctionCode::WriteMultipleCoils.to_u8()
            || func == FunctionCode::WriteMultipleRegisters.to_u8())
            && cursor < usize::from(self.frame.get(POS_BYTE_CNT)) + 9
        {
            return Ok(0);
        }

        self.irq_cursor = 0;
        self.stats.inc_in();
        self.process_request(cursor, bank)
    }

    /// Validate, execute and answer one fully assembled request frame.
    fn process_request(&mut self, len: usize, bank: &mut RegisterBank<'_>) -> ModbusResult<usize> {
        let id = self.frame.unit_id();
        if id != self.config.unit_id && id != BROADCAST_ADDRESS {
            trace!(id, "frame for another unit, dropped");
            return Ok(0);
        }
        let broadcast = id == BROADCAST_ADDRESS;

        if len < MIN_REQUEST_SIZE {
            self.stats.inc_err();
            return self.fail_quiet(ModbusError::FrameTooShort { len });
        }
        if let Err(error) = crc::verify(self.frame.as_slice()) {
            debug!(%error, "request failed CRC");
            self.stats.inc_err();
            return self.fail_quiet(ModbusError::NoReply);
        }

        let func = match FunctionCode::from_u8(self.frame.function()) {
            Ok(func) => func,
            Err(error) => return self.reject(error, broadcast),
        };
        if let Err(error) = self.validate_quantities(func, len) {
            return self.reject(error, broadcast);
        }
        if let Err(error) = self.execute_request(func, bank) {
            return self.reject(error, broadcast);
        }

        self.last_request_ms = self.port.now_ms();
        self.watchdog_primed = true;
        self.last_error = None;

        if broadcast {
            trace!("broadcast request executed, no reply");
        } else {
            self.send_frame()?;
        }
        Ok(len)
    }

    /// Structural validation of quantity and byte-count fields.
    fn validate_quantities(&self, func: FunctionCode, len: usize) -> ModbusResult<()> {
        let quantity = self.frame.u16_at(POS_QTY_HI);
        let reject = Err(ModbusError::exception(ExceptionCode::IllegalDataValue));
        match func {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
                if quantity == 0 || quantity > MAX_READ_COILS {
                    return reject;
                }
            }
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                if quantity == 0 || quantity > MAX_READ_REGISTERS {
                    return reject;
                }
            }
            FunctionCode::WriteMultipleCoils => {
                let byte_count = usize::from(self.frame.get(POS_BYTE_CNT));
                if quantity == 0
                    || quantity > MAX_WRITE_COILS
                    || byte_count != usize::from(quantity).div_ceil(8)
                    || len != byte_count + 9
                {
                    return reject;
                }
            }
            FunctionCode::WriteMultipleRegisters => {
                let byte_count = usize::from(self.frame.get(POS_BYTE_CNT));
                if quantity == 0
                    || quantity > MAX_WRITE_REGISTERS
                    || byte_count != usize::from(quantity) * 2
                    || len != byte_count + 9
                {
                    return reject;
                }
            }
            FunctionCode::WriteSingleCoil
            | FunctionCode::WriteSingleRegister
            | FunctionCode::Diagnostics => {}
        }
        Ok(())
    }

    /// Execute the request and build the reply in the frame buffer.
    ///
    /// All validation happens before the first mutation, so a failed request
    /// leaves the register bank untouched.
    fn execute_request(
        &mut self,
        func: FunctionCode,
        bank: &mut RegisterBank<'_>,
    ) -> ModbusResult<()> {
        let address = self.frame.u16_at(POS_ADDR_HI);
        match func {
            FunctionCode::ReadCoils => {
                let quantity = self.frame.u16_at(POS_QTY_HI);
                let bits = bank.coils(address, quantity)?;
                self.build_bit_response(bits)
            }
            FunctionCode::ReadDiscreteInputs => {
                let quantity = self.frame.u16_at(POS_QTY_HI);
                let bits = bank.discrete_inputs(address, quantity)?;
                self.build_bit_response(bits)
            }
            FunctionCode::ReadHoldingRegisters => {
                let quantity = self.frame.u16_at(POS_QTY_HI);
                let words = bank.holding_registers(address, quantity)?;
                self.build_word_response(words)
            }
            FunctionCode::ReadInputRegisters => {
                let quantity = self.frame.u16_at(POS_QTY_HI);
                let words = bank.input_registers(address, quantity)?;
                self.build_word_response(words)
            }
            FunctionCode::WriteSingleCoil => {
                let value = self.frame.get(POS_QTY_HI) == 0xFF;
                bank.set_coil(address, value)?;
                self.frame.truncate(6); // echo the request
                Ok(())
            }
            FunctionCode::WriteSingleRegister => {
                bank.set_holding_register(address, self.frame.u16_at(POS_QTY_HI))?;
                self.frame.truncate(6);
                Ok(())
            }
            FunctionCode::Diagnostics => {
                if address == DIAG_SUB_RESTART {
                    if let Some(hook) = self.restart_hook.as_mut() {
                        hook();
                    }
                }
                self.frame.truncate(6); // diagnostic echo
                Ok(())
            }
            FunctionCode::WriteMultipleCoils => {
                let quantity = self.frame.u16_at(POS_QTY_HI);
                let coils = bank.coils_mut(address, quantity)?;
                for (i, coil) in coils.iter_mut().enumerate() {
                    let byte = self.frame.get(POS_BYTE_CNT + 1 + i / 8);
                    *coil = (byte >> (i % 8)) & 1 == 1;
                }
                // Reply is the request header: [id][func][addr][qty]
                self.frame.truncate(6);
                Ok(())
            }
            FunctionCode::WriteMultipleRegisters => {
                let quantity = self.frame.u16_at(POS_QTY_HI);
                let words = bank.holding_registers_mut(address, quantity)?;
                for (i, word) in words.iter_mut().enumerate() {
                    *word = self.frame.u16_at(POS_BYTE_CNT + 1 + 2 * i);
                }
                self.frame.truncate(6);
                Ok(())
            }
        }
    }

    /// FC01/FC02 reply: byte count plus packed bits, tail bits zero.
    fn build_bit_response(&mut self, bits: &[bool]) -> ModbusResult<()> {
        let id = self.frame.unit_id();
        let func = self.frame.function();
        let byte_count = bits.len().div_ceil(8);

        self.frame.reset();
        self.frame.push(id)?;
        self.frame.push(func)?;
        self.frame.push(byte_count as u8)?;

        let mut byte = 0u8;
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                byte |= 1 << (i % 8);
            }
            if i % 8 == 7 {
                self.frame.push(byte)?;
                byte = 0;
            }
        }
        if bits.len() % 8 != 0 {
            self.frame.push(byte)?;
        }
        Ok(())
    }

    /// FC03/FC04 reply: byte count plus big-endian words.
    fn build_word_response(&mut self, words: &[u16]) -> ModbusResult<()> {
        let id = self.frame.unit_id();
        let func = self.frame.function();

        self.frame.reset();
        self.frame.push(id)?;
        self.frame.push(func)?;
        self.frame.push((words.len() * 2) as u8)?;
        for &word in words {
            self.frame.push_u16(word)?;
        }
        Ok(())
    }

    /// Record an error, answer with an exception PDU (unless broadcast or
    /// the error is not expressible on the wire), and hand it to the caller.
    fn reject(&mut self, error: ModbusError, broadcast: bool) -> ModbusResult<usize> {
        self.stats.inc_err();
        if !broadcast {
            if let Some(code) = error.wire_exception() {
                self.build_exception(code)?;
                self.send_frame()?;
            }
        }
        debug!(%error, "request rejected");
        self.last_error = Some(error.clone());
        Err(error)
    }

    /// Exception PDU: [id][func | 0x80][code], CRC appended at send.
    fn build_exception(&mut self, code: ExceptionCode) -> ModbusResult<()> {
        let func = self.frame.function();
        self.frame.reset();
        self.frame.push(self.config.unit_id)?;
        self.frame.push(func | 0x80)?;
        self.frame.push(code.to_u8())?;
        Ok(())
    }

    // ========================================================================
    // Shared frame I/O
    // ========================================================================

    /// Polled T3.5 frame assembly.
    ///
    /// Samples `rx_ready`; any change re-arms the silence window. Once the
    /// count has been stable for at least T3.5 the port is drained into the
    /// frame buffer in one sweep.
    fn poll_rx_frame(&mut self) -> ModbusResult<Option<usize>> {
        let count = self.port.rx_ready();
        if count == 0 {
            return Ok(None);
        }
        let now = self.port.now_ms();
        if count != self.last_rx_count {
            self.last_rx_count = count;
            self.last_byte_ms = now;
            return Ok(None);
        }
        if now.wrapping_sub(self.last_byte_ms) < self.config.t35_ms {
            return Ok(None);
        }

        self.last_rx_count = 0;
        self.frame.reset();
        let mut overflow = false;
        while self.port.rx_ready() > 0 {
            let byte = self.port.rx_pop();
            if self.frame.push(byte).is_err() {
                overflow = true; // keep draining so the port ends up empty
            }
        }
        self.stats.inc_in();
        if overflow {
            self.stats.inc_err();
            self.frame.reset();
            return Err(ModbusError::BufferOverflow);
        }
        trace!(len = self.frame.len(), "frame assembled");
        Ok(Some(self.frame.len()))
    }

    /// Append the CRC, cycle the transceiver direction, transmit, and
    /// discard any echoed bytes.
    fn send_frame(&mut self) -> ModbusResult<()> {
        let checksum = crc::crc16(self.frame.as_slice());
        self.frame.extend(&crc::to_wire(checksum))?;

        if self.config.txen_mode == TxEnableMode::Pin {
            self.port.set_direction(Direction::Tx);
        }
        self.port.tx_write(self.frame.as_slice());
        if self.config.txen_mode == TxEnableMode::Pin {
            self.port.tx_drain();
            // Hold the driver past line idle for slow-falling transceivers.
            for _ in 0..self.config.overtime_ticks {
                std::hint::spin_loop();
            }
            self.port.set_direction(Direction::Rx);
        }
        while self.port.rx_ready() > 0 {
            let _ = self.port.rx_pop(); // local echo
        }
        self.last_rx_count = 0;
        self.last_tx_ms = self.port.now_ms();
        self.stats.inc_out();
        trace!(len = self.frame.len(), "frame transmitted");
        Ok(())
    }

    /// Count-free error exit: the counter was already bumped by the caller.
    fn fail_quiet<T>(&mut self, error: ModbusError) -> ModbusResult<T> {
        self.last_error = Some(error.clone());
        Err(error)
    }

    /// Error exit that also bumps the error counter.
    fn fail<T>(&mut self, error: ModbusError) -> ModbusResult<T> {
        self.stats.inc_err();
        self.fail_quiet(error)
    }
}
