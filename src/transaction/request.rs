//! What the caller wants to do, independent of chain state

/// One account passed to a Solana program call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAccount {
    pub address: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTransfer {
    pub from: String,
    pub to: String,
    /// Amount in base units (wei, lamports, satoshis, ...)
    pub amount: u128,
    /// Free-form memo; XRP reads it as a numeric destination tag
    pub memo: Option<String>,
    /// Hex public key of the sender, required where the wire format embeds it
    /// (UTXO witnesses, XRP `SigningPubKey`)
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub from: String,
    pub to: String,
    /// Token contract, mint or asset identifier
    pub token: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub from: String,
    pub contract: String,
    pub data: Vec<u8>,
    /// Native value attached to the call
    pub value: u128,
    /// Program accounts (Solana only)
    pub accounts: Vec<CallAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDeploy {
    pub from: String,
    pub bytecode: Vec<u8>,
    pub value: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRequest {
    NativeTransfer(NativeTransfer),
    TokenTransfer(TokenTransfer),
    ContractCall(ContractCall),
    ContractDeploy(ContractDeploy),
}

impl TransactionRequest {
    pub fn sender(&self) -> &str {
        match self {
            TransactionRequest::NativeTransfer(transfer) => &transfer.from,
            TransactionRequest::TokenTransfer(transfer) => &transfer.from,
            TransactionRequest::ContractCall(call) => &call.from,
            TransactionRequest::ContractDeploy(deploy) => &deploy.from,
        }
    }

    /// Every address argument, in the order they should be validated
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            TransactionRequest::NativeTransfer(transfer) => {
                vec![transfer.from.as_str(), transfer.to.as_str()]
            }
            TransactionRequest::TokenTransfer(transfer) => {
                vec![transfer.from.as_str(), transfer.to.as_str(), transfer.token.as_str()]
            }
            TransactionRequest::ContractCall(call) => {
                let mut addresses = vec![call.from.as_str(), call.contract.as_str()];
                addresses.extend(call.accounts.iter().map(|account| account.address.as_str()));
                addresses
            }
            TransactionRequest::ContractDeploy(deploy) => vec![deploy.from.as_str()],
        }
    }

    /// Name used in `UnsupportedOperation` errors
    pub fn operation(&self) -> &'static str {
        match self {
            TransactionRequest::NativeTransfer(_) => "native transfer",
            TransactionRequest::TokenTransfer(_) => "token transfer",
            TransactionRequest::ContractCall(_) => "contract call",
            TransactionRequest::ContractDeploy(_) => "contract deployment",
        }
    }
}

impl NativeTransfer {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u128) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            memo: None,
            public_key: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }
}

impl From<NativeTransfer> for TransactionRequest {
    fn from(transfer: NativeTransfer) -> Self {
        TransactionRequest::NativeTransfer(transfer)
    }
}

impl From<TokenTransfer> for TransactionRequest {
    fn from(transfer: TokenTransfer) -> Self {
        TransactionRequest::TokenTransfer(transfer)
    }
}

impl From<ContractCall> for TransactionRequest {
    fn from(call: ContractCall) -> Self {
        TransactionRequest::ContractCall(call)
    }
}

impl From<ContractDeploy> for TransactionRequest {
    fn from(deploy: ContractDeploy) -> Self {
        TransactionRequest::ContractDeploy(deploy)
    }
}
