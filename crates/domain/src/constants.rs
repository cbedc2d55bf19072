//! Vendor constants
//!
//! Centralized location for result codes, endpoint paths, token lifetimes and
//! the property keys requested on every status poll.

// Envelope result codes
/// Envelope success code
pub const CODE_SUCCESS: i64 = 200;
/// Success code used by the vendor account service
pub const CODE_SUCCESS_ALT: i64 = 0;
/// Access token expired; refresh and retry
pub const CODE_TOKEN_EXPIRED: i64 = 460;
/// Device not connected
pub const CODE_DEVICE_OFFLINE: i64 = 6205;
/// Session no longer recognised
pub const CODE_SESSION_INVALID: &[i64] = &[401, 2401, 29003];
/// Credentials rejected
pub const CODE_AUTH_REJECTED: &[i64] = &[2062, 2064, 10004, 28001];
/// Throttled
pub const CODE_RATE_LIMITED: &[i64] = &[429, 20056];

// Session timing
/// Tokens this close to expiry count as expired
pub const SESSION_EXPIRY_BUFFER_SECS: i64 = 300;
/// Fixed lifetime of a legacy IoT token
pub const LEGACY_TOKEN_LIFETIME_SECS: i64 = 7200;
/// Used when the token response omits `expires_in`
pub const DEFAULT_OAUTH_EXPIRES_IN_SECS: i64 = 3600;

// Aliyun-style gateway paths
/// Region and gateway lookup by country
pub const PATH_REGION_GET: &str = "/living/account/region/get";
/// Exchange an auth code for an IoT token
pub const PATH_CREATE_SESSION: &str = "/account/createSessionByAuthCode";
/// Refresh an IoT token
pub const PATH_REFRESH_SESSION: &str = "/account/checkOrRefreshSession";
/// Devices bound to the account
pub const PATH_LIST_BINDINGS: &str = "/uc/listBindingByAccount";
/// Read device properties
pub const PATH_PROPERTIES_GET: &str = "/thing/properties/get";
/// Write device properties
pub const PATH_PROPERTIES_SET: &str = "/thing/properties/set";
/// Invoke a device service (commands)
pub const PATH_SERVICE_INVOKE: &str = "/thing/service/invoke";

// Vendor account / OAuth paths
/// Legacy account login
pub const PATH_USER_LOGIN: &str = "/user/login";
/// Default OAuth2 token endpoint
pub const PATH_OAUTH_TOKEN: &str = "/oauth2/token";
/// Device listing on the IoT endpoint
pub const PATH_IOT_DEVICE_PAGE: &str = "/v1/user/device/page";

// Listing
/// Devices requested per listing page
pub const DEVICE_PAGE_SIZE: usize = 100;
/// Upper bound on listing pages fetched
pub const MAX_DEVICE_PAGES: usize = 20;

/// Versioned set of property keys requested by a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyKeySet {
    /// Key set revision
    pub version: &'static str,
    /// Property identifiers
    pub keys: &'static [&'static str],
}

/// Battery level, 0-100
pub const PROP_BATTERY: &str = "batteryPercentage";
/// Charging indicator
pub const PROP_CHARGE_STATE: &str = "chargeState";
/// Vendor work-state code
pub const PROP_WORK_STATE: &str = "workState";
/// Active fault code, 0 when none
pub const PROP_ERROR_CODE: &str = "errorCode";
/// Last reported position
pub const PROP_LOCATION: &str = "location";
/// Current speed
pub const PROP_SPEED: &str = "speed";
/// Area of the current job
pub const PROP_TOTAL_AREA: &str = "totalArea";
/// Area already mowed in the current job
pub const PROP_MOWED_AREA: &str = "mowedArea";

/// Keys requested by a status poll
pub const STATUS_PROPERTY_KEYS: PropertyKeySet = PropertyKeySet {
    version: "v1",
    keys: &[
        PROP_BATTERY,
        PROP_CHARGE_STATE,
        PROP_WORK_STATE,
        PROP_ERROR_CODE,
        PROP_LOCATION,
        PROP_SPEED,
        PROP_TOTAL_AREA,
        PROP_MOWED_AREA,
    ],
};

/// Charge-state code reported while the battery is charging
pub const CHARGE_STATE_CHARGING: i64 = 1;
