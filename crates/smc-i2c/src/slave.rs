//! The slave transaction state machine.

use tracing::trace;

use crate::Addresses;

/// Transaction buffer size, both directions.
pub const BUF_SIZE: usize = 32;

/// Filler byte once the transmit buffer is exhausted but the master keeps
/// ACKing. All-ones leaves SDA released for the whole byte, so a master
/// over-reading an empty queue sees the idle-bus pattern instead of data.
const TX_FILLER: u8 = 0xFF;

/// Where the engine is inside the current transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// Bus idle or transaction finished; only a start condition leaves this.
    Stopped,
    /// Address byte is being shifted in.
    VerifyAddress,
    /// Master write: waiting for the next data byte.
    RequestData,
    /// Master write: data byte has been shifted in.
    ReceiveData,
    /// Master read: next data byte goes out.
    SendData,
    /// Master read: data byte is out, the master's ACK/NACK bit follows.
    GetResponse,
    /// Master read: the ACK/NACK bit has been shifted in.
    EvalResponse,
    /// Address byte was not ours (or a fast path had nothing to give).
    AddressMismatch,
    /// Master write NACKed for lack of buffer space.
    SlaveAborted,
    /// Master NACKed a read byte; normal end of a read transaction.
    MasterAborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MasterWrite,
    MasterRead,
}

/// What the ISR writes back to the shift hardware before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftControl {
    /// Release SDA and shift in a full byte.
    ReadByte,
    /// Release SDA and shift in a single bit (master ACK/NACK slot).
    ReadBit,
    /// Drive one bit time: low for ACK, released for NACK.
    WriteBit { sda_low: bool },
    /// Drive a full byte out, MSB first.
    WriteByte { byte: u8 },
    /// Release SDA and drop back to start-condition detection only.
    Listen,
}

/// Outgoing-byte staging area handed to the fill callbacks.
#[derive(Debug)]
pub struct TxBuffer {
    buf: [u8; BUF_SIZE],
    len: u8,
}

impl TxBuffer {
    fn new() -> Self {
        Self {
            buf: [0; BUF_SIZE],
            len: 0,
        }
    }

    /// Appends one byte; false once the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if (self.len as usize) < BUF_SIZE {
            self.buf[self.len as usize] = byte;
            self.len += 1;
            true
        } else {
            false
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if !self.push(byte) {
                return;
            }
        }
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

/// Callbacks into the register/queue logic, installed at construction.
///
/// `on_receive` runs when a master write completes (at the following start
/// or stop condition). The fill callbacks run once per read transaction,
/// before the address ACK; a fast-path fill that supplies zero bytes makes
/// the engine NACK the address.
pub trait SlaveHandlers {
    fn on_receive(&mut self, data: &[u8]);
    fn fill_general(&mut self, tx: &mut TxBuffer);
    fn fill_keyboard(&mut self, tx: &mut TxBuffer);
    fn fill_mouse(&mut self, tx: &mut TxBuffer);
}

pub struct I2cSlave {
    addrs: Addresses,
    state: BusState,
    direction: Direction,
    rx: [u8; BUF_SIZE],
    rx_len: u8,
    tx: TxBuffer,
    tx_index: u8,
    handlers: Box<dyn SlaveHandlers>,
}

impl I2cSlave {
    pub fn new(addrs: Addresses, handlers: Box<dyn SlaveHandlers>) -> Self {
        Self {
            addrs,
            state: BusState::Stopped,
            direction: Direction::MasterWrite,
            rx: [0; BUF_SIZE],
            rx_len: 0,
            tx: TxBuffer::new(),
            tx_index: 0,
            handlers,
        }
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn addresses(&self) -> Addresses {
        self.addrs
    }

    /// Start/stop-detector ISR body. The caller samples the lines after the
    /// detector fires: clock low means a start condition (a new transaction
    /// follows), data high means a stop.
    ///
    /// A master write that was in progress is delivered to the receive
    /// handler here, before the buffers are reset for whatever comes next.
    pub fn on_start_condition(&mut self, scl_low: bool, sda_high: bool) -> ShiftControl {
        if self.direction == Direction::MasterWrite && self.rx_len > 0 {
            let len = self.rx_len as usize;
            self.handlers.on_receive(&self.rx[..len]);
        }
        self.rx_len = 0;
        self.tx.reset();
        self.tx_index = 0;

        if scl_low {
            self.state = BusState::VerifyAddress;
            ShiftControl::ReadByte
        } else {
            if !sda_high {
                trace!("i2c start detector fired with neither line settled");
            }
            self.state = BusState::Stopped;
            ShiftControl::Listen
        }
    }

    /// Counter-overflow ISR body. `shifted` is the shift register content:
    /// a full byte after [`ShiftControl::ReadByte`]/`WriteByte`, or the
    /// sampled bit in bit 0 after `ReadBit`/`WriteBit`.
    pub fn on_counter_overflow(&mut self, shifted: u8) -> ShiftControl {
        match self.state {
            BusState::VerifyAddress => self.verify_address(shifted),

            BusState::RequestData => {
                self.state = BusState::ReceiveData;
                ShiftControl::ReadByte
            }

            BusState::ReceiveData => {
                if (self.rx_len as usize) < BUF_SIZE {
                    self.rx[self.rx_len as usize] = shifted;
                    self.rx_len += 1;
                    self.state = BusState::RequestData;
                    ShiftControl::WriteBit { sda_low: true }
                } else {
                    trace!("i2c write overflow, aborting transaction");
                    self.state = BusState::SlaveAborted;
                    ShiftControl::WriteBit { sda_low: false }
                }
            }

            BusState::SendData => self.send_next_byte(),

            BusState::GetResponse => {
                self.state = BusState::EvalResponse;
                ShiftControl::ReadBit
            }

            BusState::EvalResponse => {
                if shifted & 1 == 0 {
                    self.send_next_byte()
                } else {
                    // Master is done reading.
                    self.state = BusState::MasterAborted;
                    ShiftControl::Listen
                }
            }

            // AddressMismatch, the aborted states, and Stopped: nothing to
            // shift until the next start condition.
            _ => ShiftControl::Listen,
        }
    }

    fn verify_address(&mut self, shifted: u8) -> ShiftControl {
        let addr = shifted >> 1;
        let read = shifted & 1 == 1;

        // The I2C general call is never ours.
        if addr == 0 || !self.match_address(addr, read) {
            self.state = BusState::AddressMismatch;
            return ShiftControl::Listen;
        }

        self.direction = if read {
            Direction::MasterRead
        } else {
            Direction::MasterWrite
        };
        self.state = if read {
            BusState::SendData
        } else {
            BusState::RequestData
        };
        ShiftControl::WriteBit { sda_low: true }
    }

    /// Matches the address byte against the three claimed addresses and
    /// runs the read-direction fill callback. False means NACK.
    fn match_address(&mut self, addr: u8, read: bool) -> bool {
        if addr == self.addrs.general {
            if read {
                self.handlers.fill_general(&mut self.tx);
            }
            return true;
        }

        // Fast paths are read-only, and an empty queue NACKs the address
        // so the master learns "nothing available" without a clock stall.
        let fast = addr == self.addrs.keyboard || addr == self.addrs.mouse;
        if !fast || !read {
            return false;
        }
        if addr == self.addrs.keyboard {
            self.handlers.fill_keyboard(&mut self.tx);
        } else {
            self.handlers.fill_mouse(&mut self.tx);
        }
        if self.tx.is_empty() {
            trace!(addr, "i2c fast path empty, NACKing address");
            return false;
        }
        true
    }

    fn send_next_byte(&mut self) -> ShiftControl {
        self.state = BusState::GetResponse;
        let byte = if self.tx_index < self.tx.len {
            let byte = self.tx.buf[self.tx_index as usize];
            self.tx_index += 1;
            byte
        } else {
            TX_FILLER
        };
        ShiftControl::WriteByte { byte }
    }
}

impl std::fmt::Debug for I2cSlave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cSlave")
            .field("state", &self.state)
            .field("direction", &self.direction)
            .field("rx_len", &self.rx_len)
            .field("tx_len", &self.tx.len)
            .field("tx_index", &self.tx_index)
            .finish()
    }
}
