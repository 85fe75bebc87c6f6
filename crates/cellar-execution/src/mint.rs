use std::sync::Arc;

use cellar_common::{measure_duration, metric};
use cellar_ledger::signing::{self, CustodialKey, CustodialSigner, SignedTransaction, Signer};
use cellar_ledger::transaction::{ExecutionResult, ExecutionStatus, ObjectArgument, Operation, PureValue, SenderContext, TransactionBuilder};
use cellar_ledger::types::{Address, Digest, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::extract::{extract_created_object, TypeMatcher};
use crate::sink::{ExecutionOutcome, Flow};
use crate::{Client, Error};

const BOTTLE_TYPE: &str = "BottleNFT";

/// A shared object passed to the mint calls
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedObject {
    pub id: ObjectId,
    pub initial_shared_version: u64,
}

impl SharedObject {
    fn mutable(&self) -> ObjectArgument {
        ObjectArgument::Shared {
            id: self.id,
            initial_shared_version: self.initial_shared_version,
            mutable: true,
        }
    }
}

/// Custodial account and contracts used to mint rewards and bottles. Every field is optional
/// so the service starts without them, minting then fails with a configuration error.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MintConfiguration {
    #[serde(default)]
    pub custodial_key: Option<CustodialKey>,

    #[serde(default)]
    pub reward_package: Option<ObjectId>,

    /// Treasury of the reward token
    #[serde(default)]
    pub reward_treasury: Option<SharedObject>,

    #[serde(default)]
    pub bottle_package: Option<ObjectId>,

    /// Minting authority of the bottle collection
    #[serde(default)]
    pub bottle_minter: Option<SharedObject>,

    #[serde(default)]
    pub gas_budget: Option<u64>,
}

struct Contracts {
    reward_package: ObjectId,
    reward_treasury: SharedObject,
    bottle_package: ObjectId,
    bottle_minter: SharedObject,
}

impl MintConfiguration {
    fn contracts(&self) -> Result<Contracts, Error> {
        let missing = |name: &str| Error::Configuration(format!("{} is not configured", name));

        Ok(Contracts {
            reward_package: self.reward_package.ok_or_else(|| missing("reward package"))?,
            reward_treasury: self.reward_treasury.ok_or_else(|| missing("reward treasury"))?,
            bottle_package: self.bottle_package.ok_or_else(|| missing("bottle package"))?,
            bottle_minter: self.bottle_minter.ok_or_else(|| missing("bottle minter"))?,
        })
    }

    fn signer(&self) -> Result<CustodialSigner, Error> {
        match &self.custodial_key {
            Some(key) if !key.is_empty() => Ok(CustodialSigner::from_key(key)?),
            _ => Err(Error::Configuration("custodial key is not configured".to_string())),
        }
    }
}

/// Absent attributes deserialize empty and are refused by the mint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottleAttributes {
    pub name: String,
    pub vintage: u16,
    pub region: String,
    pub producer: String,
    pub category: String,

    /// Position of the bottle in its collection, from 1
    pub sequence: u64,
    pub total_supply: u64,

    pub image_url: String,
    pub verification_code: String,

    pub custom_text: Option<String>,
}

impl BottleAttributes {
    fn validate(&self) -> Result<(), Error> {
        let required = [
            ("name", &self.name),
            ("region", &self.region),
            ("producer", &self.producer),
            ("category", &self.category),
            ("image_url", &self.image_url),
            ("verification_code", &self.verification_code),
        ];

        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::InvalidRequest(format!("bottle {} is missing", name)));
        }

        if self.vintage == 0 {
            return Err(Error::InvalidRequest("bottle vintage is missing".to_string()));
        }

        if self.total_supply == 0 || self.sequence == 0 || self.sequence > self.total_supply {
            return Err(Error::InvalidRequest(format!("bottle #{} of {} is out of range", self.sequence, self.total_supply)));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub recipient: String,
    pub reward_amount: u64,
    pub bottle: BottleAttributes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub digest: Digest,
    pub status: ExecutionStatus,

    /// Minted bottle, `None` when the effects did not show it
    pub nft_id: Option<ObjectId>,

    /// Custodial account that signed the mint
    pub signer: Address,
}

impl Client {
    /// Mints `reward_amount` reward tokens and one bottle to the recipient in a single
    /// transaction, signed and paid for by the custodial account
    #[instrument(name = "mint", skip_all, fields(recipient = %request.recipient))]
    pub async fn mint(&self, request: MintRequest) -> Result<MintReceipt, Error> {
        let (result, duration) = measure_duration!(self.mint_bottle(request).await);

        metric!(counter[execution_request] = 1, method = "mint");
        metric!(histogram[execution_request_duration_milliseconds] = duration.as_millis(), method = "mint");
        if let Err(e) = &result {
            metric!(counter[execution_request_error] = 1, method = "mint", error = e.kind());
        }

        result
    }

    async fn mint_bottle(&self, request: MintRequest) -> Result<MintReceipt, Error> {
        let configuration = self.mint_configuration();
        let contracts = configuration.contracts()?;
        let signer = Arc::new(configuration.signer()?);

        let recipient = Address::from_hex(request.recipient.trim()).map_err(|_| Error::InvalidRequest(format!("recipient {} is not an account address", request.recipient)))?;
        request.bottle.validate()?;
        if request.reward_amount == 0 {
            return Err(Error::InvalidRequest("reward amount must be positive".to_string()));
        }

        let result = self.execute_mint(&contracts, signer.clone(), recipient, &request).await;

        let nft_id = result.as_ref().ok().and_then(|x| extract_created_object(x, &TypeMatcher::contains(BOTTLE_TYPE)));
        self.sink().record(ExecutionOutcome::new(Flow::CustodialMint, &result, nft_id)).await;

        let result = result?;
        Ok(MintReceipt {
            digest: result.digest,
            status: result.status,
            nft_id,
            signer: signer.address(),
        })
    }

    async fn execute_mint(&self, contracts: &Contracts, signer: Arc<CustodialSigner>, recipient: Address, request: &MintRequest) -> Result<ExecutionResult, Error> {
        let mut builder = TransactionBuilder::new();
        builder
            .add_operation(Self::reward_operation(contracts, recipient, request.reward_amount))?
            .add_operation(Self::bottle_operation(contracts, recipient, &request.bottle))?;

        let mut context = SenderContext::new(signer.address());
        if let Some(budget) = self.mint_configuration().gas_budget {
            context = context.with_gas_budget(budget);
        }

        let ledger = self.ledger().acquire().await.map_err(Error::from_connect)?;
        let transaction = builder.build_complete(&context, &ledger).await.map_err(Error::from_build)?;
        let bytes = transaction.to_bytes()?;

        let signature = signing::sign(&bytes, &Signer::Custodial(signer)).await?;
        let transaction = SignedTransaction::new(&transaction, vec![signature.to_base64()])?;

        self.submitter().submit(transaction).await
    }

    fn reward_operation(contracts: &Contracts, recipient: Address, amount: u64) -> Operation {
        Operation::move_call(contracts.reward_package, "reward", "mint")
            .with_argument(contracts.reward_treasury.mutable())
            .with_argument(PureValue::U64(amount))
            .with_argument(PureValue::Address(recipient))
    }

    fn bottle_operation(contracts: &Contracts, recipient: Address, bottle: &BottleAttributes) -> Operation {
        Operation::move_call(contracts.bottle_package, "bottle", "mint")
            .with_argument(contracts.bottle_minter.mutable())
            .with_argument(PureValue::String(bottle.name.clone()))
            .with_argument(PureValue::U16(bottle.vintage))
            .with_argument(PureValue::String(bottle.region.clone()))
            .with_argument(PureValue::String(bottle.producer.clone()))
            .with_argument(PureValue::String(bottle.category.clone()))
            .with_argument(PureValue::U64(bottle.sequence))
            .with_argument(PureValue::U64(bottle.total_supply))
            .with_argument(PureValue::String(bottle.image_url.clone()))
            .with_argument(PureValue::String(bottle.verification_code.clone()))
            .with_argument(PureValue::Option(bottle.custom_text.clone().map(|x| Box::new(PureValue::String(x)))))
            .with_argument(PureValue::Address(recipient))
    }
}
