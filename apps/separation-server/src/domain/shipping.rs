//! Logistics and packaging enumerations.
//!
//! Both enums accept case- and space-insensitive display variants on input
//! and normalize to a canonical snake_case form before storage.

use serde::{Deserialize, Serialize};

/// How the order leaves the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogisticsType {
    /// Lalamove courier.
    Lalamove,
    /// Correios postal service.
    Correios,
    /// Melhor Envio shipping broker.
    MelhorEnvio,
    /// Client picks up at the warehouse.
    Retirada,
    /// Own delivery.
    Entrega,
    /// Client waiting in the store.
    ClienteNaLoja,
    /// Intercity bus dispatch.
    Onibus,
}

impl LogisticsType {
    /// Parse a display variant (e.g. "Melhor Envio", "cliente na loja").
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_variant(s).as_str() {
            "lalamove" => Some(Self::Lalamove),
            "correios" => Some(Self::Correios),
            "melhor_envio" => Some(Self::MelhorEnvio),
            "retirada" => Some(Self::Retirada),
            "entrega" => Some(Self::Entrega),
            "cliente_na_loja" => Some(Self::ClienteNaLoja),
            "onibus" => Some(Self::Onibus),
            _ => None,
        }
    }

    /// Canonical storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lalamove => "lalamove",
            Self::Correios => "correios",
            Self::MelhorEnvio => "melhor_envio",
            Self::Retirada => "retirada",
            Self::Entrega => "entrega",
            Self::ClienteNaLoja => "cliente_na_loja",
            Self::Onibus => "onibus",
        }
    }
}

/// What the picked items are packed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// Cardboard box.
    Caixa,
    /// Bag.
    Sacola,
}

impl PackageType {
    /// Parse a display variant.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_variant(s).as_str() {
            "caixa" => Some(Self::Caixa),
            "sacola" => Some(Self::Sacola),
            _ => None,
        }
    }

    /// Canonical storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Caixa => "caixa",
            Self::Sacola => "sacola",
        }
    }
}

/// Lowercase, trim, and join internal whitespace/hyphens with underscores.
fn normalize_variant(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logistics_accepts_display_variants() {
        assert_eq!(
            LogisticsType::parse("Melhor Envio"),
            Some(LogisticsType::MelhorEnvio)
        );
        assert_eq!(
            LogisticsType::parse("CLIENTE NA LOJA"),
            Some(LogisticsType::ClienteNaLoja)
        );
        assert_eq!(
            LogisticsType::parse("melhor-envio"),
            Some(LogisticsType::MelhorEnvio)
        );
        assert_eq!(LogisticsType::parse("lalamove "), Some(LogisticsType::Lalamove));
        assert_eq!(LogisticsType::parse("sedex"), None);
    }

    #[test]
    fn package_accepts_display_variants() {
        assert_eq!(PackageType::parse("Caixa"), Some(PackageType::Caixa));
        assert_eq!(PackageType::parse(" SACOLA "), Some(PackageType::Sacola));
        assert_eq!(PackageType::parse("envelope"), None);
    }

    #[test]
    fn canonical_names_round_trip() {
        for variant in [
            LogisticsType::Lalamove,
            LogisticsType::Correios,
            LogisticsType::MelhorEnvio,
            LogisticsType::Retirada,
            LogisticsType::Entrega,
            LogisticsType::ClienteNaLoja,
            LogisticsType::Onibus,
        ] {
            assert_eq!(LogisticsType::parse(variant.as_str()), Some(variant));
        }
    }
}
