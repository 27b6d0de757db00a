//! Vivanuncios adapter configuration.
//!
//! Gumtree-engine site: search URLs end in a `v1c<cat>l<loc>pN` token, ad
//! pages carry a GA dataLayer push with the ad id and seller metadata.

use lazy_static::lazy_static;

use super::adapter::{CodeMaps, ListingConfig, PlatformAdapter, ScrapeOptions, SearchConfig};
use super::extraction::{Extractor, FieldSpec};

lazy_static! {
    static ref ADAPTER: PlatformAdapter = PlatformAdapter {
        code: "vivanuncios",
        name: "Vivanuncios",
        search: SearchConfig {
            result_selector: "div.tileV2, div.tileV1",
            link_selector: "a.href-link, a.tile-title-text",
            title_selector: Some("span.tile-title-text, a.tile-title-text"),
            price_selector: Some("span.ad-price"),
            location_selector: Some("div.tile-location"),
            total_count: vec![
                Extractor::css("span.total-ads"),
                Extractor::pattern(r"(?i)de\s+([\d,]+)\s+resultados"),
            ],
            page_link_selector: "div.pagination a, ul.pagination-list a",
        },
        listing: ListingConfig {
            fields: vec![
                FieldSpec::new(
                    "title",
                    vec![Extractor::css("h1#vip-ad-title"), Extractor::css("h1.title")],
                ),
                FieldSpec::new(
                    "price",
                    vec![
                        Extractor::css("#vip-ad-price span.amount"),
                        Extractor::css("span.vip-price"),
                    ],
                ),
                FieldSpec::new(
                    "description",
                    vec![
                        Extractor::css("#vip-ad-description div.description-content"),
                        Extractor::css("div.description-content"),
                    ],
                ),
                FieldSpec::new(
                    "property_type",
                    vec![Extractor::css("li.attribute-tipo span.value")],
                ),
                FieldSpec::new(
                    "operation_type",
                    vec![Extractor::css("li.attribute-operacion span.value")],
                ),
                FieldSpec::new(
                    "bedrooms",
                    vec![Extractor::css("li.attribute-recamaras span.value")],
                ),
                FieldSpec::new(
                    "bathrooms",
                    vec![Extractor::css("li.attribute-banos span.value")],
                ),
                FieldSpec::new(
                    "parking",
                    vec![Extractor::css("li.attribute-estacionamiento span.value")],
                ),
                FieldSpec::new(
                    "area_built",
                    vec![Extractor::css("li.attribute-metros span.value")],
                ),
                FieldSpec::new(
                    "area_lot",
                    vec![Extractor::css("li.attribute-terreno span.value")],
                ),
                FieldSpec::new(
                    "address",
                    vec![Extractor::css("div.vip-location span.address")],
                ),
                FieldSpec::new(
                    "neighborhood",
                    vec![Extractor::css("div.vip-location span.neighborhood")],
                ),
                FieldSpec::new("city", vec![Extractor::css("div.vip-location span.city")]),
                FieldSpec::new("state", vec![Extractor::css("div.vip-location span.state")]),
                FieldSpec::new(
                    "publisher_name",
                    vec![Extractor::css("div.seller-info span.seller-name")],
                ),
            ],
            amenity_selector: Some("ul.vip-amenities li, ul.amenities-list li"),
            image_selector: Some(("div.vip-gallery img", "src")),
            js_variable_patterns: vec![
                ("latitude", r#""latitude"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("longitude", r#""longitude"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("price", r#""amount"\s*:\s*"?(\d+(?:\.\d+)?)"?"#),
            ],
            data_layer_patterns: vec![
                ("external_id", r#""adId"\s*:\s*"?(\d+)"?"#),
                ("publisher_type", r#""sellerType"\s*:\s*"(\w+)""#),
                ("operation_type", r#""transactionType"\s*:\s*"(\w+)""#),
                ("property_type", r#""categoryId"\s*:\s*"?(\d+)"?"#),
            ],
        },
        maps: CodeMaps {
            property_types: &[
                ("1098", "house"),
                ("1100", "apartment"),
                ("1102", "land"),
                ("1104", "commercial"),
                ("casas", "house"),
                ("casa", "house"),
                ("departamentos", "apartment"),
                ("departamento", "apartment"),
                ("terrenos", "land"),
                ("terreno", "land"),
                ("locales comerciales", "commercial"),
                ("oficinas", "office"),
            ],
            operation_types: &[
                ("venta", "sale"),
                ("sell", "sale"),
                ("sale", "sale"),
                ("renta", "rent"),
                ("rent", "rent"),
                ("alquiler", "rent"),
            ],
            currencies: &[
                ("mxn", "MXN"),
                ("pesos", "MXN"),
                ("usd", "USD"),
                ("dolares", "USD"),
                ("dls", "USD"),
            ],
            publisher_types: &[
                ("inmobiliaria", "agency"),
                ("agencia", "agency"),
                ("agent", "agency"),
                ("particular", "owner"),
                ("owner", "owner"),
                ("dueno directo", "owner"),
                ("desarrollador", "developer"),
                ("developer", "developer"),
            ],
            amenities: &[
                ("alberca", "pool"),
                ("piscina", "pool"),
                ("jardin", "garden"),
                ("cochera", "garage"),
                ("garage", "garage"),
                ("estacionamiento", "parking"),
                ("seguridad", "security"),
                ("vigilancia", "security"),
                ("gimnasio", "gym"),
                ("terraza", "terrace"),
                ("balcon", "balcony"),
                ("elevador", "elevator"),
                ("ascensor", "elevator"),
                ("amueblado", "furnished"),
                ("mascotas", "pets_allowed"),
                ("aire acondicionado", "air_conditioning"),
                ("roof garden", "roof_garden"),
                ("cuarto de servicio", "service_room"),
                ("bodega", "storage"),
            ],
            subtypes: &[
                (r"\bduplex\b", "duplex"),
                (r"\bpenthouse\b", "penthouse"),
                (r"\bloft\b", "loft"),
                (r"\bestudio\b|\bstudio\b", "studio"),
                (r"\btownhouse\b", "townhouse"),
                (r"\bcondominio\b", "condo"),
                (r"\bcoto\b|\bprivada\b", "gated_community"),
            ],
        },
        external_id_patterns: &[r"/(\d{6,})/?$"],
        scrape: ScrapeOptions {
            proxy_country: Some("mx"),
            headers: &[("Accept-Language", "es-MX,es;q=0.9")],
            wait_ms: Some(3500),
        },
    };
}

pub fn adapter() -> &'static PlatformAdapter {
    &ADAPTER
}
