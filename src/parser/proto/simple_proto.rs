use crate::parser::script::evaluate_script;
use bitcoin::{Block, Network, Transaction, TxIn, TxOut};
use serde::{Deserialize, Serialize};

const SATOSHI_PER_BITCOIN: f64 = 100_000_000.0;

///
/// Block in a `simple` format, the input of every writer.
///
/// Compared to a `bitcoin::Block` it carries:
/// - `block hash`, `height` and `time` only, no other header fields
/// - `transaction id` precomputed
/// - `output script types` and `output addresses` precomputed
/// - inputs reduced to the outpoints they spend
///
/// Identifiers are plain strings, so blocks can also be built
/// from JSON-RPC responses or by hand.
///
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct SBlock {
    pub header: SBlockHeader,
    pub txdata: Vec<STransaction>,
}

impl SBlock {
    ///
    /// Simplify a decoded block found at `height`.
    ///
    pub fn parse(block: Block, height: u32) -> SBlock {
        SBlock {
            header: SBlockHeader {
                block_hash: block.header.block_hash().to_string(),
                height,
                time: block.header.time,
            },
            txdata: block.txdata.into_iter().map(|x| x.into()).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct SBlockHeader {
    pub block_hash: String,
    pub height: u32,
    /// unix seconds
    pub time: u32,
}

///
/// `STransaction` keeps the transaction id, the spent outpoints
/// and the outputs with their script types and addresses.
///
/// A coinbase transaction has an empty `input`.
///
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct STransaction {
    pub txid: String,
    /// Outpoints spent by this transaction
    pub input: Vec<STxIn>,
    /// List of outputs
    pub output: Vec<STxOut>,
}

impl STransaction {
    /// No spent outpoint means newly created coins.
    #[inline]
    pub fn is_coinbase(&self) -> bool {
        self.input.is_empty()
    }
}

impl From<Transaction> for STransaction {
    fn from(tx: Transaction) -> STransaction {
        STransaction {
            txid: tx.txid().to_string(),
            input: tx
                .input
                .into_iter()
                .filter(|x| !x.previous_output.is_null())
                .map(|x| x.into())
                .collect(),
            output: tx
                .output
                .into_iter()
                .enumerate()
                .map(|(n, x)| STxOut::parse(x, n as u32))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct STxIn {
    pub txid: String,
    pub vout: u32,
}

impl From<TxIn> for STxIn {
    fn from(tx_in: TxIn) -> STxIn {
        STxIn {
            txid: tx_in.previous_output.txid.to_string(),
            vout: tx_in.previous_output.vout,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct STxOut {
    pub index: u32,
    /// Amount in BTC
    pub value: f64,
    pub script_type: String,
    pub addresses: Vec<String>,
}

impl STxOut {
    pub fn parse(out: TxOut, index: u32) -> STxOut {
        let eval = evaluate_script(&out.script_pubkey, Network::Bitcoin);
        STxOut {
            index,
            value: out.value as f64 / SATOSHI_PER_BITCOIN,
            script_type: eval.pattern.to_string(),
            addresses: eval.addresses.iter().map(|a| a.to_string()).collect(),
        }
    }
}
