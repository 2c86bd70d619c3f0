//! Batched exchange: the auctioneer's side of the auction phase.
//!
//! Opens all N registration payloads, runs the matching policy off-circuit,
//! derives the output notes, and proves the exchange circuit. The policy is
//! pluggable; the one invariant the driver (and the circuit) holds it to is
//! that the batch totals are preserved coin-wise and energy-wise.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::circuit::exchange::{ExchangeCircuit, ExchangeSlotWitness};
use crate::crypto::encryption::REGISTRATION_CIPHERTEXT_LEN;
use crate::crypto::keys::{generator, scalar_to_field, DhKeypair};
use crate::crypto::{exchange_output_rho, serial_number};
use crate::encoding::{self, field_to_u128};
use crate::error::{ProtocolError, ProtocolResult};
use crate::note::Note;
use crate::proof::{CancelToken, ProofSystem};
use crate::register::{open_registration, RegistrationPayload};

/// One decrypted registration as the matching policy sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub coins: u128,
    pub energy: u128,
    pub bid: u128,
}

/// The post-match holdings of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub coins: u128,
    pub energy: u128,
}

/// A deterministic matching rule over the opened orders.
///
/// Implementations must return one allocation per order and preserve the
/// coin and energy totals; the driver re-checks both before proving.
pub trait MatchingPolicy {
    fn allocate(&self, orders: &[Order]) -> Vec<Allocation>;
}

/// Sealed-bid double auction: buyers and sellers are classified by
/// bid-per-energy-unit and reserves, sorted best-first, and matched at the
/// midpoint price for the smaller of the two quantities.
#[derive(Clone, Copy, Debug)]
pub struct DoubleAuction {
    /// Bid-per-unit at or above which a participant reads as a buyer.
    pub price_threshold: u128,
    /// Energy reserve at or above which a participant reads as a seller.
    pub energy_threshold: u128,
}

impl DoubleAuction {
    pub fn new() -> Self {
        Self {
            price_threshold: 50,
            energy_threshold: 100,
        }
    }
}

impl Default for DoubleAuction {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingPolicy for DoubleAuction {
    fn allocate(&self, orders: &[Order]) -> Vec<Allocation> {
        let mut buyers = Vec::new();
        let mut sellers = Vec::new();

        for (i, order) in orders.iter().enumerate() {
            let bid_per_unit = if order.energy > 0 {
                order.bid / order.energy
            } else {
                order.bid
            };
            if bid_per_unit >= self.price_threshold && order.energy < self.energy_threshold {
                buyers.push(i);
            } else if bid_per_unit < self.price_threshold && order.energy >= self.energy_threshold
            {
                sellers.push(i);
            } else if order.energy < order.coins {
                // More coins than energy: wants to buy energy.
                buyers.push(i);
            } else {
                sellers.push(i);
            }
        }

        // Highest bids buy first, lowest asks sell first.
        buyers.sort_by(|a, b| orders[*b].bid.cmp(&orders[*a].bid));
        sellers.sort_by(|a, b| orders[*a].bid.cmp(&orders[*b].bid));

        let mut allocations: Vec<Allocation> = orders
            .iter()
            .map(|o| Allocation {
                coins: o.coins,
                energy: o.energy,
            })
            .collect();

        let mut b = 0;
        let mut s = 0;
        while b < buyers.len() && s < sellers.len() {
            let buyer = buyers[b];
            let seller = sellers[s];
            let buyer_bid = orders[buyer].bid;
            let seller_ask = orders[seller].bid;

            if buyer_bid < seller_ask {
                break;
            }

            let price = (buyer_bid + seller_ask) / 2;
            let quantity = allocations[seller].energy.min(orders[buyer].energy);
            let value = price * quantity;

            // A trade the buyer cannot pay for is skipped, not truncated.
            if quantity == 0 || allocations[buyer].coins < value {
                b += 1;
                continue;
            }

            allocations[buyer].energy += quantity;
            allocations[buyer].coins -= value;
            allocations[seller].energy -= quantity;
            allocations[seller].coins += value;

            b += 1;
            s += 1;
        }

        allocations
    }
}

/// The published record of a batched exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeRecord {
    #[serde(with = "encoding::field_vec")]
    pub sn_in: Vec<Fr>,
    #[serde(with = "encoding::field_vec")]
    pub cm_in: Vec<Fr>,
    #[serde(with = "encoding::field_vec")]
    pub cm_out: Vec<Fr>,
    #[serde(with = "encoding::field_array_vec")]
    pub c: Vec<[Fr; REGISTRATION_CIPHERTEXT_LEN]>,
    #[serde(with = "encoding::point_vec")]
    pub pk_dh: Vec<G1Affine>,
    #[serde(with = "encoding::point")]
    pub pk_t: G1Affine,
    #[serde(with = "encoding::point")]
    pub g: G1Affine,
    #[serde(with = "encoding::hex_bytes")]
    pub proof: Vec<u8>,
    /// Output notes in slot order, openings included, so recipients can
    /// claim them from the ledger.
    pub produced_notes: Vec<Note>,
}

impl ExchangeRecord {
    /// Public inputs in the circuit's allocation order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        let mut inputs = Vec::new();
        inputs.extend_from_slice(&self.sn_in);
        inputs.extend_from_slice(&self.cm_in);
        inputs.extend_from_slice(&self.cm_out);
        for row in &self.c {
            inputs.extend_from_slice(row);
        }
        for p in &self.pk_dh {
            inputs.push(p.x);
            inputs.push(p.y);
        }
        inputs.push(self.pk_t.x);
        inputs.push(self.pk_t.y);
        inputs.push(self.g.x);
        inputs.push(self.g.y);
        inputs
    }
}

/// Run the exchange over exactly N registration payloads.
pub fn run_exchange<const N: usize, R: RngCore + CryptoRng>(
    payloads: &[RegistrationPayload],
    auctioneer: &DhKeypair,
    policy: &dyn MatchingPolicy,
    system: &ProofSystem<ExchangeCircuit<N>>,
    cancel: &CancelToken,
    rng: &mut R,
) -> ProtocolResult<ExchangeRecord> {
    if payloads.len() != N {
        return Err(ProtocolError::Witness(format!(
            "exchange expects {N} registrations, got {}",
            payloads.len()
        )));
    }

    // 1. Open every payload and recover the registered notes.
    let mut plains = Vec::with_capacity(N);
    let mut notes_in = Vec::with_capacity(N);
    for payload in payloads {
        let (plain, note) = open_registration(payload, auctioneer)?;
        plains.push(plain);
        notes_in.push(note);
    }

    let serials: Vec<Fr> = plains
        .iter()
        .zip(&notes_in)
        .map(|(plain, note)| serial_number(&plain.sk_in, &note.rho))
        .collect();

    // 2. Match off-circuit.
    let orders = plains
        .iter()
        .map(|p| {
            Ok(Order {
                coins: field_to_u128(&p.coins)?,
                energy: field_to_u128(&p.energy)?,
                bid: field_to_u128(&p.bid)?,
            })
        })
        .collect::<Result<Vec<_>, crate::error::CryptoError>>()?;
    let allocations = policy.allocate(&orders);
    if allocations.len() != N {
        return Err(ProtocolError::Witness(
            "matching policy returned the wrong number of allocations".into(),
        ));
    }
    let in_totals = orders.iter().fold((0u128, 0u128), |acc, o| {
        (acc.0 + o.coins, acc.1 + o.energy)
    });
    let out_totals = allocations.iter().fold((0u128, 0u128), |acc, a| {
        (acc.0 + a.coins, acc.1 + a.energy)
    });
    if in_totals != out_totals {
        return Err(ProtocolError::Witness(
            "matching policy broke value conservation".into(),
        ));
    }
    info!(
        coins = in_totals.0,
        energy = in_totals.1,
        "auction matched, totals preserved"
    );

    // 3. Derive output notes and assemble the witness.
    let mut circuit = ExchangeCircuit::<N>::blank();
    circuit.pk_t = Some(auctioneer.pk);
    circuit.g = Some(generator());
    circuit.sk_t = Some(scalar_to_field(&auctioneer.sk));

    let mut produced_notes = Vec::with_capacity(N);
    for i in 0..N {
        let plain = &plains[i];
        let note_in = &notes_in[i];
        let allocation = &allocations[i];

        let out_coin = Fr::from(allocation.coins);
        let out_energy = Fr::from(allocation.energy);
        let rho_out = exchange_output_rho(i, &serials);
        let rand_out = Fr::rand(rng);
        let note_out = Note::from_opening(out_coin, out_energy, plain.pk_out, rho_out, rand_out);
        debug!(slot = i, "exchange output derived");

        circuit.sn_in[i] = Some(serials[i]);
        circuit.cm_in[i] = Some(note_in.cm);
        circuit.cm_out[i] = Some(note_out.cm);
        circuit.c[i] = payloads[i].c_aux.map(Some);
        circuit.pk_dh[i] = Some(payloads[i].pk_dh);
        circuit.slots[i] = ExchangeSlotWitness {
            in_coin: Some(note_in.coins),
            in_energy: Some(note_in.energy),
            pk_in: Some(note_in.pk),
            rho_in: Some(note_in.rho),
            rand_in: Some(note_in.r),
            sk_in: Some(plain.sk_in),
            bid: Some(plain.bid),
            out_coin: Some(out_coin),
            out_energy: Some(out_energy),
            pk_out: Some(plain.pk_out),
            rho_out: Some(rho_out),
            rand_out: Some(rand_out),
        };
        produced_notes.push(note_out);
    }

    // 4. Prove and assemble the record.
    let record_inputs = ExchangeRecord {
        sn_in: serials,
        cm_in: notes_in.iter().map(|n| n.cm).collect(),
        cm_out: produced_notes.iter().map(|n| n.cm).collect(),
        c: payloads.iter().map(|p| p.c_aux).collect(),
        pk_dh: payloads.iter().map(|p| p.pk_dh).collect(),
        pk_t: auctioneer.pk,
        g: generator(),
        proof: Vec::new(),
        produced_notes,
    };
    let proof = system.prove(circuit, cancel)?;

    Ok(ExchangeRecord {
        proof,
        ..record_inputs
    })
}

/// Verify an exchange record's proof against its public inputs.
pub fn verify_exchange<const N: usize>(
    record: &ExchangeRecord,
    system: &ProofSystem<ExchangeCircuit<N>>,
) -> ProtocolResult<()> {
    if system.verify(&record.proof, &record.public_inputs())? {
        Ok(())
    } else {
        Err(ProtocolError::InvalidProof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(coins: u128, energy: u128, bid: u128) -> Order {
        Order { coins, energy, bid }
    }

    fn totals(allocs: &[Allocation]) -> (u128, u128) {
        allocs
            .iter()
            .fold((0, 0), |acc, a| (acc.0 + a.coins, acc.1 + a.energy))
    }

    #[test]
    fn double_auction_preserves_totals() {
        let orders: Vec<Order> = (0..10)
            .map(|i| order(1000 + 200 * i, 50 + 10 * i, 25 + 3 * i))
            .collect();

        let allocations = DoubleAuction::new().allocate(&orders);
        assert_eq!(allocations.len(), orders.len());

        let in_totals = orders
            .iter()
            .fold((0, 0), |acc, o: &Order| (acc.0 + o.coins, acc.1 + o.energy));
        assert_eq!(totals(&allocations), in_totals);
    }

    #[test]
    fn double_auction_moves_energy_to_the_high_bidder() {
        // One clear buyer (high bid per unit, little energy) and one clear
        // seller (low ask, plenty of energy).
        let orders = vec![order(10_000, 10, 900), order(100, 500, 100)];

        let allocations = DoubleAuction::new().allocate(&orders);

        assert!(allocations[0].energy > orders[0].energy);
        assert!(allocations[1].energy < orders[1].energy);
        assert!(allocations[0].coins < orders[0].coins);
        assert!(allocations[1].coins > orders[1].coins);
        assert_eq!(totals(&allocations), (10_100, 510));
    }

    #[test]
    fn double_auction_skips_unaffordable_trades() {
        // Buyer bids high but holds almost no coins.
        let orders = vec![order(1, 10, 900), order(100, 500, 100)];

        let allocations = DoubleAuction::new().allocate(&orders);

        // Nothing moved; totals intact.
        assert_eq!(allocations[0].coins, 1);
        assert_eq!(allocations[1].energy, 500);
        assert_eq!(totals(&allocations), (101, 510));
    }

    #[test]
    fn no_crossing_bids_means_no_trade() {
        let orders = vec![order(1000, 10, 60), order(1000, 500, 80)];

        let allocations = DoubleAuction::new().allocate(&orders);
        assert_eq!(allocations[0], Allocation { coins: 1000, energy: 10 });
        assert_eq!(
            allocations[1],
            Allocation {
                coins: 1000,
                energy: 500
            }
        );
    }

    #[test]
    fn empty_batch_allocates_nothing() {
        let allocations = DoubleAuction::new().allocate(&[]);
        assert!(allocations.is_empty());
    }
}
