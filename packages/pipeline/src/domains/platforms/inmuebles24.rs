//! Inmuebles24 adapter configuration.
//!
//! Navent-engine site: cards expose `data-qa` hooks, detail pages embed the
//! posting as a JS object, ids ride the `-<digits>.html` URL suffix.

use lazy_static::lazy_static;

use super::adapter::{CodeMaps, ListingConfig, PlatformAdapter, ScrapeOptions, SearchConfig};
use super::extraction::{Extractor, FieldSpec};

lazy_static! {
    static ref ADAPTER: PlatformAdapter = PlatformAdapter {
        code: "inmuebles24",
        name: "Inmuebles24",
        search: SearchConfig {
            result_selector: "div[data-qa='posting PROPERTY'], div.posting-card",
            link_selector: "a[data-qa='posting-link'], h2.posting-title a",
            title_selector: Some("h2[data-qa='POSTING_CARD_TITLE'], h2.posting-title"),
            price_selector: Some("div[data-qa='POSTING_CARD_PRICE'], span.first-price"),
            location_selector: Some("span[data-qa='POSTING_CARD_LOCATION'], span.posting-location"),
            total_count: vec![
                Extractor::css("h1.results-title"),
                Extractor::pattern(r"(?i)([\d,]+)\s+(?:inmuebles|propiedades|casas|departamentos)"),
            ],
            page_link_selector: "ul.pagination li a, nav.paging a",
        },
        listing: ListingConfig {
            fields: vec![
                FieldSpec::new(
                    "title",
                    vec![
                        Extractor::css("h1[data-qa='POSTING_TITLE']"),
                        Extractor::css("h1.title-property"),
                    ],
                ),
                FieldSpec::new(
                    "price",
                    vec![
                        Extractor::css("div[data-qa='POSTING_PRICE']"),
                        Extractor::css("div.price-value span"),
                    ],
                ),
                FieldSpec::new(
                    "description",
                    vec![
                        Extractor::css("section[data-qa='POSTING_DESCRIPTION']"),
                        Extractor::css("div#longDescription"),
                    ],
                ),
                FieldSpec::new(
                    "address",
                    vec![
                        Extractor::css("div[data-qa='POSTING_LOCATION'] h4"),
                        Extractor::css("h4.section-location"),
                    ],
                ),
                FieldSpec::new(
                    "bedrooms",
                    vec![Extractor::css("span[data-qa='features-bedrooms']")],
                ),
                FieldSpec::new(
                    "bathrooms",
                    vec![Extractor::css("span[data-qa='features-bathrooms']")],
                ),
                FieldSpec::new(
                    "parking",
                    vec![Extractor::css("span[data-qa='features-parking']")],
                ),
                FieldSpec::new(
                    "area_built",
                    vec![Extractor::css("span[data-qa='features-covered-surface']")],
                ),
                FieldSpec::new(
                    "area_lot",
                    vec![Extractor::css("span[data-qa='features-total-surface']")],
                ),
                FieldSpec::new(
                    "publisher_name",
                    vec![
                        Extractor::css("h3[data-qa='PUBLISHER_NAME']"),
                        Extractor::css("h3.publisher-name"),
                    ],
                ),
            ],
            amenity_selector: Some("section#reactGeneralFeatures li, ul.general-features li"),
            image_selector: Some(("div.gallery-content img", "src")),
            js_variable_patterns: vec![
                ("external_id", r#""postingId"\s*:\s*"?(\d+)"?"#),
                ("external_id", r"idAviso\s*:\s*'?(\d+)"),
                ("latitude", r#""mapLat"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("latitude", r#""latitude"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("longitude", r#""mapLng"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("longitude", r#""longitude"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("operation_type", r#""operationType"\s*:\s*"([^"]+)""#),
                ("property_type", r#""realEstateType"\s*:\s*"([^"]+)""#),
                ("price", r#""amount"\s*:\s*([\d.]+)"#),
                ("currency", r#""currency"\s*:\s*"(\w+)""#),
                ("neighborhood", r#""neighborhood"\s*:\s*"([^"]+)""#),
                ("city", r#""city"\s*:\s*"([^"]+)""#),
                ("state", r#""province"\s*:\s*"([^"]+)""#),
            ],
            data_layer_patterns: vec![
                ("external_id", r#""posting_id"\s*:\s*"?(\d+)"?"#),
                ("publisher_type", r#""publisher_type"\s*:\s*"(\w+)""#),
            ],
        },
        maps: CodeMaps {
            property_types: &[
                ("casa", "house"),
                ("casas", "house"),
                ("departamento", "apartment"),
                ("departamentos", "apartment"),
                ("ph", "apartment"),
                ("terreno", "land"),
                ("terrenos", "land"),
                ("local comercial", "commercial"),
                ("locales comerciales", "commercial"),
                ("oficina comercial", "office"),
                ("oficinas", "office"),
                ("bodega", "warehouse"),
                ("bodegas", "warehouse"),
            ],
            operation_types: &[
                ("venta", "sale"),
                ("sale", "sale"),
                ("renta", "rent"),
                ("rent", "rent"),
                ("alquiler", "rent"),
                ("desarrollo", "presale"),
            ],
            currencies: &[
                ("mxn", "MXN"),
                ("mn", "MXN"),
                ("pesos", "MXN"),
                ("usd", "USD"),
                ("dolares", "USD"),
            ],
            publisher_types: &[
                ("inmobiliaria", "agency"),
                ("agency", "agency"),
                ("particular", "owner"),
                ("owner", "owner"),
                ("desarrolladora", "developer"),
                ("developer", "developer"),
                ("constructora", "developer"),
            ],
            amenities: &[
                ("alberca", "pool"),
                ("piscina", "pool"),
                ("pileta", "pool"),
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
                (r"\bpenthouse\b|\bph\b", "penthouse"),
                (r"\bloft\b", "loft"),
                (r"\bestudio\b|\bstudio\b", "studio"),
                (r"\btownhouse\b", "townhouse"),
                (r"\bcondominio\b", "condo"),
                (r"\bcoto\b|\bprivada\b", "gated_community"),
            ],
        },
        external_id_patterns: &[r"-(\d{6,})\.html?$", r"/(\d{6,})/?$"],
        scrape: ScrapeOptions {
            proxy_country: Some("mx"),
            headers: &[("Accept-Language", "es-MX,es;q=0.9")],
            wait_ms: Some(5000),
        },
    };
}

pub fn adapter() -> &'static PlatformAdapter {
    &ADAPTER
}
