pub use cellar_rpc::client::{Client, Error};
pub use cellar_rpc::{
    BottleAttributes, ErrorData, ExecuteSponsoredRequest, ExecuteSponsoredResponse, MintBottleRequest, MintBottleResponse, SponsorTransactionRequest,
    SponsorTransactionResponse,
};
