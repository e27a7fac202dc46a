//!
//! The fixed entity/relationship schema shared by every writer.
//!
//! Both the flat-file and the relational writer read their record-set
//! names, column order, column types and relationship endpoints from
//! here, so their output is interchangeable.
//!

use std::fmt;

///
/// Semantic type of an attribute.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Identifier,
    Integer,
    Decimal,
    Boolean,
    String,
}

///
/// Role an attribute plays in a bulk graph import.
///
/// `Start` and `End` are the endpoints of a directed relationship,
/// each naming the label of the entity it points at.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Property,
    Id(&'static str),
    Start(&'static str),
    End(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub attr_type: AttrType,
    pub role: Role,
}

impl Attribute {
    const fn new(name: &'static str, attr_type: AttrType, role: Role) -> Self {
        Attribute {
            name,
            attr_type,
            role,
        }
    }

    ///
    /// Type/role suffix understood by the graph import tool,
    /// e.g. `ID(Block)`, `START_ID(Output)` or `int`.
    ///
    pub fn annotation(&self) -> Option<String> {
        match self.role {
            Role::Id(label) => Some(format!("ID({})", label)),
            Role::Start(label) => Some(format!("START_ID({})", label)),
            Role::End(label) => Some(format!("END_ID({})", label)),
            Role::Property => match self.attr_type {
                AttrType::Integer => Some("int".to_owned()),
                AttrType::Decimal => Some("double".to_owned()),
                AttrType::Boolean => Some("boolean".to_owned()),
                AttrType::Identifier | AttrType::String => None,
            },
        }
    }

    /// Header column name, annotated unless `plain` is set.
    pub fn header(&self, plain: bool) -> String {
        match self.annotation() {
            Some(annotation) if !plain => format!("{}:{}", self.name, annotation),
            _ => self.name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Node with the given label
    Entity(&'static str),
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub kind: RecordKind,
    pub attributes: &'static [Attribute],
}

impl RecordSchema {
    /// The identifier column of an entity record-set.
    pub fn identifier(&self) -> Option<&'static Attribute> {
        self.attributes
            .iter()
            .find(|a| matches!(a.role, Role::Id(_)))
    }

    /// The source endpoint column of a relationship record-set.
    pub fn source(&self) -> Option<&'static Attribute> {
        self.attributes
            .iter()
            .find(|a| matches!(a.role, Role::Start(_)))
    }

    /// The target endpoint column of a relationship record-set.
    pub fn target(&self) -> Option<&'static Attribute> {
        self.attributes
            .iter()
            .find(|a| matches!(a.role, Role::End(_)))
    }

    pub fn header(&self, plain: bool) -> Vec<String> {
        self.attributes.iter().map(|a| a.header(plain)).collect()
    }
}

const BLOCKS: &[Attribute] = &[
    Attribute::new("hash", AttrType::Identifier, Role::Id("Block")),
    Attribute::new("height", AttrType::Integer, Role::Property),
    Attribute::new("timestamp", AttrType::Integer, Role::Property),
];

const TRANSACTIONS: &[Attribute] = &[
    Attribute::new("txid", AttrType::Identifier, Role::Id("Transaction")),
    Attribute::new("coinbase", AttrType::Boolean, Role::Property),
];

const OUTPUTS: &[Attribute] = &[
    Attribute::new("txid_n", AttrType::Identifier, Role::Id("Output")),
    Attribute::new("n", AttrType::Integer, Role::Property),
    Attribute::new("value", AttrType::Decimal, Role::Property),
    Attribute::new("type", AttrType::String, Role::Property),
];

const ADDRESSES: &[Attribute] = &[Attribute::new("address", AttrType::Identifier, Role::Id("Address"))];

const REL_BLOCK_TX: &[Attribute] = &[
    Attribute::new("hash", AttrType::Identifier, Role::Start("Block")),
    Attribute::new("txid", AttrType::Identifier, Role::End("Transaction")),
];

const REL_TX_OUTPUT: &[Attribute] = &[
    Attribute::new("txid", AttrType::Identifier, Role::Start("Transaction")),
    Attribute::new("txid_n", AttrType::Identifier, Role::End("Output")),
];

// spent output -> spending transaction
const REL_INPUT: &[Attribute] = &[
    Attribute::new("txid", AttrType::Identifier, Role::End("Transaction")),
    Attribute::new("txid_n", AttrType::Identifier, Role::Start("Output")),
];

const REL_OUTPUT_ADDRESS: &[Attribute] = &[
    Attribute::new("txid_n", AttrType::Identifier, Role::Start("Output")),
    Attribute::new("address", AttrType::Identifier, Role::End("Address")),
];

static SCHEMAS: [RecordSchema; 8] = [
    RecordSchema {
        name: "blocks",
        kind: RecordKind::Entity("Block"),
        attributes: BLOCKS,
    },
    RecordSchema {
        name: "transactions",
        kind: RecordKind::Entity("Transaction"),
        attributes: TRANSACTIONS,
    },
    RecordSchema {
        name: "outputs",
        kind: RecordKind::Entity("Output"),
        attributes: OUTPUTS,
    },
    RecordSchema {
        name: "addresses",
        kind: RecordKind::Entity("Address"),
        attributes: ADDRESSES,
    },
    RecordSchema {
        name: "rel_block_tx",
        kind: RecordKind::Relationship,
        attributes: REL_BLOCK_TX,
    },
    RecordSchema {
        name: "rel_tx_output",
        kind: RecordKind::Relationship,
        attributes: REL_TX_OUTPUT,
    },
    RecordSchema {
        name: "rel_input",
        kind: RecordKind::Relationship,
        attributes: REL_INPUT,
    },
    RecordSchema {
        name: "rel_output_address",
        kind: RecordKind::Relationship,
        attributes: REL_OUTPUT_ADDRESS,
    },
];

///
/// The eight record-sets of an export.
///
/// The discriminant doubles as the index into per-record-set arrays.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordSet {
    Blocks = 0,
    Transactions = 1,
    Outputs = 2,
    Addresses = 3,
    RelBlockTx = 4,
    RelTxOutput = 5,
    RelInput = 6,
    RelOutputAddress = 7,
}

impl RecordSet {
    pub const ALL: [RecordSet; 8] = [
        RecordSet::Blocks,
        RecordSet::Transactions,
        RecordSet::Outputs,
        RecordSet::Addresses,
        RecordSet::RelBlockTx,
        RecordSet::RelTxOutput,
        RecordSet::RelInput,
        RecordSet::RelOutputAddress,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn schema(self) -> &'static RecordSchema {
        &SCHEMAS[self.index()]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn is_entity(self) -> bool {
        matches!(self.schema().kind, RecordKind::Entity(_))
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
