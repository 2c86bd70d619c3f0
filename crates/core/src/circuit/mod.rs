//! The four zero-knowledge circuits.
//!
//! Every circuit follows the same pattern: recompute each declared
//! commitment, serial number, ciphertext element and point derivation from
//! the witness, and assert equality with the public inputs. The public
//! input vectors of the record types in the driver modules list their
//! elements in exactly the order the circuits allocate them.

pub mod exchange;
pub mod gadgets;
pub mod register;
pub mod transfer;
pub mod withdraw;

pub use exchange::ExchangeCircuit;
pub use register::RegisterCircuit;
pub use transfer::TransferCircuit;
pub use withdraw::WithdrawCircuit;
