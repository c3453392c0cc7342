//! Live REST account adapter, grounded on `PolymarketClobAdapter`
//! (`vault/execution.rs`): HMAC-SHA256 request signing
//! (`timestamp + method + path + body`), `reqwest` transport, and
//! tolerant response structs (`#[serde(alias = ...)]`) so minor per-venue
//! field-naming differences don't need a new adapter.
//!
//! One instance serves one venue; `base_url` plus this generic REST shape
//! is what lets a single implementation cover every `credentials.json`
//! entry that isn't paper-traded.

use crate::credentials::CredentialEntry;
use crate::error::AdapterError;
use crate::model::{AccountId, CanonicalSymbol, MarginMode, Position, SymbolSpec};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub struct GenericRestAccountAdapter {
    account_id: AccountId,
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    api_passphrase: Option<String>,
}

impl GenericRestAccountAdapter {
    pub fn new(account_id: AccountId, base_url: String, credentials: &CredentialEntry) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            account_id,
            client,
            base_url,
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            api_passphrase: credentials.api_passphrase.clone(),
        }
    }

    fn sign(&self, method: &str, path: &str, body: &str, timestamp: i64) -> Result<String, AdapterError> {
        let message = format!("{timestamp}{method}{path}{body}");
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| AdapterError::Rejected(format!("HMAC key error: {e}")))?;
        mac.update(message.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn auth_headers(&self, method: &str, path: &str, body: &str) -> Result<Vec<(String, String)>, AdapterError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.sign(method, path, body, timestamp)?;
        let mut headers = vec![
            ("X-API-KEY".to_string(), self.api_key.clone()),
            ("X-SIGNATURE".to_string(), signature),
            ("X-TIMESTAMP".to_string(), timestamp.to_string()),
        ];
        if let Some(passphrase) = &self.api_passphrase {
            headers.push(("X-PASSPHRASE".to_string(), passphrase.clone()));
        }
        Ok(headers)
    }

    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, AdapterError> {
        let body_str = match body {
            Some(b) => serde_json::to_string(b)?,
            None => String::new(),
        };
        let headers = self.auth_headers(method.as_str(), path, &body_str)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.request(method, &url);
        for (key, value) in headers {
            request = request.header(&key, &value);
        }
        if !body_str.is_empty() {
            request = request.header("Content-Type", "application/json").body(body_str);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AdapterError::Rejected(format!("{status}: {text}")));
        }
        debug!(account = %self.account_id, path, status = %status, "rest adapter response");
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Deserialize)]
struct EquityResponse {
    #[serde(alias = "totalEquity", alias = "equity", alias = "total_equity")]
    total_equity: f64,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    #[serde(alias = "symbol")]
    symbol: String,
    #[serde(alias = "positionAmt", alias = "size")]
    size: f64,
    #[serde(alias = "entryPrice", alias = "entry_price")]
    entry_price: f64,
    #[serde(alias = "leverage", default = "default_leverage")]
    leverage: u32,
    #[serde(alias = "marginType", alias = "margin_mode", default)]
    margin_mode: RestMarginMode,
}

fn default_leverage() -> u32 {
    1
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum RestMarginMode {
    #[default]
    Isolated,
    Cross,
}

impl From<RestMarginMode> for MarginMode {
    fn from(mode: RestMarginMode) -> Self {
        match mode {
            RestMarginMode::Isolated => MarginMode::Isolated,
            RestMarginMode::Cross => MarginMode::Cross,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpecResponse {
    #[serde(alias = "minSize", alias = "min_size")]
    min_size: f64,
    #[serde(alias = "sizeStep", alias = "size_step", alias = "stepSize")]
    size_step: f64,
    #[serde(alias = "priceStep", alias = "price_step", alias = "tickSize")]
    price_step: f64,
    #[serde(alias = "maxSingleOrderSize", alias = "max_single_order_size")]
    max_single_order_size: f64,
    #[serde(alias = "contractMultiplier", alias = "contract_multiplier", default = "default_multiplier")]
    contract_multiplier: f64,
    #[serde(alias = "maxLeverage", alias = "max_leverage")]
    max_leverage: u32,
    #[serde(alias = "supportsIsolatedMargin", alias = "supports_isolated_margin", default = "default_true")]
    supports_isolated_margin: bool,
    #[serde(alias = "allowsChangeWhileOpen", alias = "allows_change_while_open", default)]
    allows_change_while_open: bool,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(alias = "markPrice", alias = "mark_price", alias = "price", alias = "lastPrice")]
    mark_price: f64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(alias = "filledQty", alias = "filled_size", alias = "executedQty")]
    filled_qty: f64,
}

#[derive(Debug, Serialize)]
struct LeverageRequest<'a> {
    symbol: &'a str,
    leverage: u32,
}

#[derive(Debug, Serialize)]
struct MarginModeRequest<'a> {
    symbol: &'a str,
    margin_mode: &'a str,
}

#[derive(Debug, Serialize)]
struct MarketOrderRequest<'a> {
    symbol: &'a str,
    side: &'a str,
    quantity: f64,
}

#[async_trait]
impl AccountAdapter for GenericRestAccountAdapter {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn get_total_equity(&self) -> Result<f64, AdapterError> {
        let resp: EquityResponse = self.request(reqwest::Method::GET, "/account/equity", None::<&()>).await?;
        Ok(resp.total_equity)
    }

    async fn get_positions(&self) -> Result<Vec<(CanonicalSymbol, Position)>, AdapterError> {
        let resp: Vec<PositionResponse> = self.request(reqwest::Method::GET, "/account/positions", None::<&()>).await?;
        Ok(resp
            .into_iter()
            .map(|p| {
                (
                    CanonicalSymbol::from(p.symbol),
                    Position { size: p.size, entry_price: p.entry_price, leverage: p.leverage, margin_mode: p.margin_mode.into() },
                )
            })
            .collect())
    }

    async fn get_symbol_spec(&self, symbol: &CanonicalSymbol) -> Result<SymbolSpec, AdapterError> {
        let path = format!("/symbols/{symbol}/spec");
        let resp: SpecResponse = self.request(reqwest::Method::GET, &path, None::<&()>).await?;
        Ok(SymbolSpec {
            min_size: resp.min_size,
            size_step: resp.size_step,
            price_step: resp.price_step,
            max_single_order_size: resp.max_single_order_size,
            contract_multiplier: resp.contract_multiplier,
            max_leverage: resp.max_leverage,
            supports_isolated_margin: resp.supports_isolated_margin,
            allows_change_while_open: resp.allows_change_while_open,
        })
    }

    async fn get_mark_price(&self, symbol: &CanonicalSymbol) -> Result<f64, AdapterError> {
        let path = format!("/symbols/{symbol}/ticker");
        let resp: TickerResponse = self.request(reqwest::Method::GET, &path, None::<&()>).await?;
        Ok(resp.mark_price)
    }

    async fn set_leverage(&self, symbol: &CanonicalSymbol, leverage: u32) -> Result<(), AdapterError> {
        let body = LeverageRequest { symbol: symbol.as_str(), leverage };
        let _resp: serde_json::Value =
            self.request(reqwest::Method::POST, "/account/leverage", Some(&body)).await?;
        Ok(())
    }

    async fn set_margin_mode(&self, symbol: &CanonicalSymbol, mode: MarginMode) -> Result<(), AdapterError> {
        let margin_mode = match mode {
            MarginMode::Isolated => "isolated",
            MarginMode::Cross => "cross",
        };
        let body = MarginModeRequest { symbol: symbol.as_str(), margin_mode };
        let _resp: serde_json::Value =
            self.request(reqwest::Method::POST, "/account/margin-mode", Some(&body)).await?;
        Ok(())
    }

    async fn place_market(&self, symbol: &CanonicalSymbol, signed_qty: f64) -> Result<f64, AdapterError> {
        let side = if signed_qty >= 0.0 { "buy" } else { "sell" };
        let body = MarketOrderRequest { symbol: symbol.as_str(), side, quantity: signed_qty.abs() };
        let resp: OrderResponse = self.request(reqwest::Method::POST, "/orders/market", Some(&body)).await?;
        Ok(resp.filled_qty * signed_qty.signum())
    }

    async fn close_position(&self, symbol: &CanonicalSymbol) -> Result<(), AdapterError> {
        let path = format!("/positions/{symbol}/close");
        let _resp: serde_json::Value = self.request(reqwest::Method::POST, &path, None::<&()>).await?;
        Ok(())
    }
}
