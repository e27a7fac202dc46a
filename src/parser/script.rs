use bitcoin::blockdata::opcodes::{all, All};
use bitcoin::blockdata::script::Instruction;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::util::address::Payload;
use bitcoin::{Address, Network, PubkeyHash, PublicKey, Script};
use serde::{Deserialize, Serialize};
use std::fmt;
use Instruction::{Op, PushBytes};

///
/// Output script types, as tagged in the `type` column of exported outputs.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptType {
    Pay2PublicKey,
    Pay2PublicKeyHash,
    Pay2ScriptHash,
    Pay2WitnessPublicKeyHash,
    Pay2WitnessScriptHash,
    WitnessProgram,
    NullData,
    Unspendable,
    Pay2MultiSig,
    NonStandard,
}

///
/// Script type of an output script and the addresses it pays to.
///
#[derive(Clone, Debug)]
pub struct ScriptInfo {
    pub addresses: Vec<Address>,
    pub pattern: ScriptType,
}

impl ScriptInfo {
    fn new(address: Option<Address>, pattern: ScriptType) -> Self {
        ScriptInfo {
            addresses: address.into_iter().collect(),
            pattern,
        }
    }
}

///
/// Classify `script` and extract the addresses it pays to on `net`.
///
/// Bare multisig scripts yield one pay-to-pubkey-hash address per key.
///
pub fn evaluate_script(script: &Script, net: Network) -> ScriptInfo {
    let address = || Address::from_script(script, net);
    if script.is_p2pk() {
        ScriptInfo::new(p2pk_to_address(script, net), ScriptType::Pay2PublicKey)
    } else if script.is_p2pkh() {
        ScriptInfo::new(address(), ScriptType::Pay2PublicKeyHash)
    } else if script.is_p2sh() {
        ScriptInfo::new(address(), ScriptType::Pay2ScriptHash)
    } else if script.is_v0_p2wpkh() {
        ScriptInfo::new(address(), ScriptType::Pay2WitnessPublicKeyHash)
    } else if script.is_v0_p2wsh() {
        ScriptInfo::new(address(), ScriptType::Pay2WitnessScriptHash)
    } else if script.is_witness_program() {
        ScriptInfo::new(address(), ScriptType::WitnessProgram)
    } else if script.is_op_return() {
        ScriptInfo::new(None, ScriptType::NullData)
    } else if script.is_provably_unspendable() {
        ScriptInfo::new(None, ScriptType::Unspendable)
    } else if let Some(addresses) = multisig_addresses(script, net) {
        ScriptInfo {
            addresses,
            pattern: ScriptType::Pay2MultiSig,
        }
    } else {
        ScriptInfo::new(None, ScriptType::NonStandard)
    }
}

///
/// Addresses of a bare `m-of-n OP_CHECKMULTISIG` script,
/// `None` if the script does not have that shape.
///
/// Follows bitcoinj's `ScriptPattern.isSentToMultisig()`.
///
fn multisig_addresses(script: &Script, net: Network) -> Option<Vec<Address>> {
    let chunks = script
        .instructions()
        .collect::<Result<Vec<Instruction>, _>>()
        .ok()?;
    if chunks.len() < 4 {
        return None;
    }
    let (first, rest) = chunks.split_first()?;
    let (last, rest) = rest.split_last()?;
    let (num_keys_op, keys) = rest.split_last()?;

    match last {
        Op(op) if *op == all::OP_CHECKMULTISIG || *op == all::OP_CHECKMULTISIGVERIFY => {}
        _ => return None,
    }
    // both OP_N must be valid, and the last one must match the number of keys
    let num_keys = num_keys_of(num_keys_op)?;
    if num_keys < 1 || num_keys as usize != keys.len() || num_keys_of(first)? < 1 {
        return None;
    }

    let mut addresses = Vec::with_capacity(keys.len());
    for key in keys {
        match key {
            PushBytes(data) => match PublicKey::from_slice(data) {
                Ok(pk) => addresses.push(Address {
                    payload: Payload::PubkeyHash(pk.pubkey_hash()),
                    network: net,
                }),
                // shape is multisig but keys are garbage
                Err(_) => return Some(Vec::new()),
            },
            Op(_) => return None,
        }
    }
    Some(addresses)
}

///
/// Decode OP_N, as bitcoinj's `decodeFromOpN()`.
///
#[inline]
fn decode_from_op_n(op: &All) -> i32 {
    if *op == all::OP_PUSHBYTES_0 {
        0
    } else if *op == all::OP_PUSHNUM_NEG1 {
        -1
    } else {
        op.into_u8() as i32 + 1 - all::OP_PUSHNUM_1.into_u8() as i32
    }
}

#[inline]
fn num_keys_of(instruction: &Instruction) -> Option<i32> {
    match instruction {
        Op(op) => {
            let code = op.into_u8();
            if *op == all::OP_PUSHNUM_NEG1
                || *op == all::OP_PUSHBYTES_0
                || (code >= all::OP_PUSHNUM_1.into_u8() && code <= all::OP_PUSHNUM_16.into_u8())
            {
                Some(decode_from_op_n(op))
            } else {
                None
            }
        }
        PushBytes(_) => None,
    }
}

///
/// Pay-to-pubkey-hash address of the key pushed by a p2pk script.
///
#[inline]
fn p2pk_to_address(script: &Script, net: Network) -> Option<Address> {
    match script.instructions().next() {
        Some(Ok(PushBytes(pk))) => {
            let pkh = hash160::Hash::hash(pk);
            Some(Address {
                payload: Payload::PubkeyHash(PubkeyHash::from_slice(&pkh).ok()?),
                network: net,
            })
        }
        _ => None,
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match *self {
            ScriptType::Pay2PublicKey => "p2pk",
            ScriptType::Pay2PublicKeyHash => "p2pkh",
            ScriptType::Pay2ScriptHash => "p2sh",
            ScriptType::Pay2WitnessPublicKeyHash => "p2wpkh",
            ScriptType::Pay2WitnessScriptHash => "p2wsh",
            ScriptType::WitnessProgram => "witness",
            ScriptType::NullData => "nulldata",
            ScriptType::Unspendable => "unspendable",
            ScriptType::Pay2MultiSig => "multisig",
            ScriptType::NonStandard => "nonstandard",
        };
        f.write_str(tag)
    }
}
