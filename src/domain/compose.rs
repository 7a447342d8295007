use crate::error::{PaymentError, Result};
use std::collections::{BTreeMap, HashMap};

/// Order data a payment request is composed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: String,
    pub shopper_reference: String,
    pub shopper_email: String,
    pub shopper_name: Option<String>,
    pub telephone: Option<String>,
    pub billing_address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub house_number: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Key/value pairs merged into an outbound processor request.
///
/// Keys are kept sorted so composed requests are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFragment {
    fields: BTreeMap<String, String>,
}

impl RequestFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn merge(&mut self, other: RequestFragment) {
        self.fields.extend(other.fields);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Capability interface for payment-type specific request composition.
///
/// Variants are selected by configuration through the registry, not by
/// inheritance or runtime discovery.
pub trait RequestComposer: Send + Sync {
    fn compose(&self, order: &Order) -> Result<RequestFragment>;
}

/// Plain card payments: shopper identity only.
pub struct CardComposer;

impl RequestComposer for CardComposer {
    fn compose(&self, order: &Order) -> Result<RequestFragment> {
        let mut fragment = RequestFragment::new();
        fragment.insert("merchantReference", &order.id);
        fragment.insert("shopperReference", &order.shopper_reference);
        fragment.insert("shopperEmail", &order.shopper_email);
        Ok(fragment)
    }
}

/// Open-invoice payments additionally require the shopper's name and billing
/// address, since the invoice is issued against them.
pub struct OpenInvoiceComposer;

impl RequestComposer for OpenInvoiceComposer {
    fn compose(&self, order: &Order) -> Result<RequestFragment> {
        let mut fragment = CardComposer.compose(order)?;

        let name = order.shopper_name.as_deref().ok_or_else(|| {
            PaymentError::InvalidOrder(format!(
                "open invoice payment for order '{}' requires a shopper name",
                order.id
            ))
        })?;
        let address = order.billing_address.as_ref().ok_or_else(|| {
            PaymentError::InvalidOrder(format!(
                "open invoice payment for order '{}' requires a billing address",
                order.id
            ))
        })?;

        fragment.insert("shopperName", name);
        if let Some(telephone) = &order.telephone {
            fragment.insert("shopperTelephone", telephone);
        }
        fragment.insert("billingAddress.street", &address.street);
        fragment.insert("billingAddress.houseNumber", &address.house_number);
        fragment.insert("billingAddress.city", &address.city);
        fragment.insert("billingAddress.postalCode", &address.postal_code);
        fragment.insert("billingAddress.country", &address.country);
        Ok(fragment)
    }
}

/// Maps payment type names to composers. Assembled once at startup and passed
/// by reference to whatever composes requests; there is no global lookup.
#[derive(Default)]
pub struct ComposerRegistry {
    composers: HashMap<String, Box<dyn RequestComposer>>,
}

impl ComposerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in payment types: `card` and `openinvoice`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("card", Box::new(CardComposer));
        registry.register("openinvoice", Box::new(OpenInvoiceComposer));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, composer: Box<dyn RequestComposer>) {
        self.composers.insert(name.into(), composer);
    }

    pub fn get(&self, name: &str) -> Option<&dyn RequestComposer> {
        self.composers.get(name).map(|composer| composer.as_ref())
    }
}
