//! Casas y Terrenos adapter configuration.
//!
//! Next.js site: most structured data lives in the `__NEXT_DATA__` payload,
//! card markup is plain. Ids ride a `-<digits>` slug suffix.

use lazy_static::lazy_static;

use super::adapter::{CodeMaps, ListingConfig, PlatformAdapter, ScrapeOptions, SearchConfig};
use super::extraction::{Extractor, FieldSpec};

lazy_static! {
    static ref ADAPTER: PlatformAdapter = PlatformAdapter {
        code: "casasyterrenos",
        name: "Casas y Terrenos",
        search: SearchConfig {
            result_selector: "div.property-card, article.card-property",
            link_selector: "a.property-card-link, a[href*='/propiedad/']",
            title_selector: Some("h2.property-card-title, h3.card-title"),
            price_selector: Some("p.property-card-price, span.card-price"),
            location_selector: Some("p.property-card-location, span.card-location"),
            total_count: vec![
                Extractor::css("span.total-results"),
                Extractor::pattern(r"(?i)([\d,]+)\s+propiedades"),
            ],
            page_link_selector: "nav.pagination a, ul.paginator li a",
        },
        listing: ListingConfig {
            fields: vec![
                FieldSpec::new("title", vec![Extractor::css("h1.property-title")]),
                FieldSpec::new(
                    "price",
                    vec![
                        Extractor::css("div.property-price"),
                        Extractor::css("span.price-amount"),
                    ],
                ),
                FieldSpec::new(
                    "description",
                    vec![
                        Extractor::css("div.property-description"),
                        Extractor::css("section#descripcion p"),
                    ],
                ),
                FieldSpec::new(
                    "bedrooms",
                    vec![Extractor::css("span.feature-bedrooms, li.recamaras")],
                ),
                FieldSpec::new(
                    "bathrooms",
                    vec![Extractor::css("span.feature-bathrooms, li.banos")],
                ),
                FieldSpec::new(
                    "parking",
                    vec![Extractor::css("span.feature-parking, li.estacionamientos")],
                ),
                FieldSpec::new(
                    "area_built",
                    vec![Extractor::css("span.feature-construction, li.construccion")],
                ),
                FieldSpec::new(
                    "area_lot",
                    vec![Extractor::css("span.feature-land, li.terreno")],
                ),
                FieldSpec::new("address", vec![Extractor::css("p.property-address")]),
                FieldSpec::new(
                    "neighborhood",
                    vec![Extractor::css("span.property-colonia")],
                ),
                FieldSpec::new("city", vec![Extractor::css("span.property-city")]),
                FieldSpec::new("state", vec![Extractor::css("span.property-state")]),
                FieldSpec::new(
                    "publisher_name",
                    vec![
                        Extractor::css("div.agency-name"),
                        Extractor::css("span.publisher"),
                    ],
                ),
            ],
            amenity_selector: Some("ul.property-amenities li, div.amenities span"),
            image_selector: Some(("div.property-gallery img", "src")),
            js_variable_patterns: vec![
                ("external_id", r#""propertyId"\s*:\s*"?(\d+)"?"#),
                ("latitude", r#""lat"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("longitude", r#""lng"\s*:\s*"?(-?\d+\.\d+)"?"#),
                ("price", r#""price"\s*:\s*"?(\d+(?:\.\d+)?)"?"#),
                ("currency", r#""currency"\s*:\s*"(\w+)""#),
                ("operation_type", r#""operation"\s*:\s*"(\w+)""#),
                ("property_type", r#""propertyType"\s*:\s*"([^"]+)""#),
                ("city", r#""municipality"\s*:\s*"([^"]+)""#),
                ("state", r#""state"\s*:\s*"([^"]+)""#),
            ],
            data_layer_patterns: vec![],
        },
        maps: CodeMaps {
            property_types: &[
                ("casa", "house"),
                ("casas", "house"),
                ("departamento", "apartment"),
                ("departamentos", "apartment"),
                ("terreno", "land"),
                ("terrenos", "land"),
                ("local", "commercial"),
                ("locales", "commercial"),
                ("oficina", "office"),
                ("oficinas", "office"),
                ("bodega", "warehouse"),
                ("rancho", "ranch"),
                ("quinta", "ranch"),
            ],
            operation_types: &[
                ("venta", "sale"),
                ("vender", "sale"),
                ("sell", "sale"),
                ("renta", "rent"),
                ("rentar", "rent"),
                ("rent", "rent"),
                ("preventa", "presale"),
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
                ("asesor", "agency"),
                ("particular", "owner"),
                ("dueno", "owner"),
                ("desarrollador", "developer"),
                ("constructora", "developer"),
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
                ("caseta", "security"),
                ("gimnasio", "gym"),
                ("terraza", "terrace"),
                ("balcon", "balcony"),
                ("elevador", "elevator"),
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
                (r"\bestudio\b", "studio"),
                (r"\btownhouse\b", "townhouse"),
                (r"\bcondominio\b", "condo"),
                (r"\bcoto\b|\bprivada\b|\bfraccionamiento\b", "gated_community"),
            ],
        },
        external_id_patterns: &[r"-(\d{5,})/?$", r"/(\d{5,})/?$"],
        scrape: ScrapeOptions {
            proxy_country: Some("mx"),
            headers: &[("Accept-Language", "es-MX,es;q=0.9")],
            wait_ms: Some(2500),
        },
    };
}

pub fn adapter() -> &'static PlatformAdapter {
    &ADAPTER
}
