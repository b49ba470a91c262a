//! Static layer catalogue: groups, endpoints, protection and rotation.

/// Layer groups, each a directory under the data root.
pub const LAYER_GROUPS: &[(&str, &[&str])] = &[
    (
        "planning",
        &["rezonings", "charlotte_2040_plan", "opportunity_zones", "current_zoning"],
    ),
    ("infrastructure", &["transit_projects", "cip_projects", "transit_stations"]),
    ("risk", &["cmpd_incidents", "flood_zones"]),
    ("development", &["building_permits", "school_districts"]),
    ("lifestyle", &["walkability"]),
];

/// Layers that are large, hand-optimized, or lack a verified source. These
/// are never written by the scraper.
pub const PROTECTED_LAYERS: &[&str] = &[
    "flood_zones",
    "charlotte_2040_plan",
    "transit_stations",
    "walkability",
    "building_permits",
    "opportunity_zones",
    "current_zoning",
];

/// Weekday (0 = Monday) → layers refreshed that day.
pub const ROTATION: [&[&str]; 7] = [
    &["rezonings"],
    &["transit_projects", "cip_projects"],
    &["cmpd_incidents"],
    &["school_districts"],
    &[],
    &[],
    &[],
];

const ENDPOINTS: &[(&str, &str)] = &[
    (
        "rezonings",
        "https://gis.charlottenc.gov/arcgis/rest/services/PLN/Rezonings/MapServer/0/query?where=1%3D1&outFields=*&outSR=4326&f=geojson",
    ),
    (
        "transit_projects",
        "https://gis.charlottenc.gov/arcgis/rest/services/CATS/TransitStationDevelopmentPublic/MapServer/0/query?where=1%3D1&outFields=*&outSR=4326&f=geojson",
    ),
    (
        "cip_projects",
        "https://gis.charlottenc.gov/arcgis/rest/services/PLN/Planning_ThingsNearMe/MapServer/6/query?where=1%3D1&outFields=*&outSR=4326&f=geojson",
    ),
    (
        "cmpd_incidents",
        "https://gis.charlottenc.gov/arcgis/rest/services/CMPD/CMPDIncidents/MapServer/0/query?where=YEAR+%3E%3D+%272024%27&outFields=INCIDENT_REPORT_ID,LATITUDE_PUBLIC,LONGITUDE_PUBLIC,HIGHEST_NIBRS_DESCRIPTION,DATE_REPORTED,LOCATION&outSR=4326&f=geojson",
    ),
    (
        "school_districts",
        "https://gis.charlottenc.gov/arcgis/rest/services/CMS/SchoolDistricts/MapServer/0/query?where=1%3D1&outFields=*&outSR=4326&f=geojson",
    ),
];

pub fn is_protected(layer: &str) -> bool {
    PROTECTED_LAYERS.contains(&layer)
}

/// GeoJSON query URL for a layer, if it has a verified one.
pub fn endpoint(layer: &str) -> Option<&'static str> {
    ENDPOINTS.iter().find(|(name, _)| *name == layer).map(|(_, url)| *url)
}

/// Directory group a layer belongs to.
pub fn group_of(layer: &str) -> Option<&'static str> {
    LAYER_GROUPS
        .iter()
        .find(|(_, layers)| layers.contains(&layer))
        .map(|(group, _)| *group)
}

/// Layers to refresh for `day`, or every rotated layer when `all` is set.
/// Days past Sunday have no targets.
pub fn plan_targets(day: u8, all: bool) -> Vec<&'static str> {
    if all {
        return ROTATION.iter().flat_map(|layers| layers.iter().copied()).collect();
    }
    ROTATION
        .get(usize::from(day))
        .map(|layers| layers.to_vec())
        .unwrap_or_default()
}
