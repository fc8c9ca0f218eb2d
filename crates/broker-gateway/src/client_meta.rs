//! User-Agent classification.
//!
//! The verdict payload denormalizes coarse device metadata so the scanning
//! device can show "Chrome on Windows" next to the result. Matching is
//! keyword-based; anything unrecognized reports `Unknown`.

/// Parsed client metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMeta {
    pub os: String,
    pub browser: String,
    pub brand: String,
    pub is_mobile: bool,
}

/// Classify a User-Agent string.
pub fn parse_user_agent(ua: &str) -> ClientMeta {
    let os;
    let brand;
    if ua.contains("iPhone") || ua.contains("iPad") {
        os = "iOS";
        brand = "Apple";
    } else if ua.contains("Android") {
        os = "Android";
        brand = if ua.contains("Samsung") || ua.contains("SM-") {
            "Samsung"
        } else if ua.contains("Pixel") {
            "Google"
        } else if ua.contains("Huawei") {
            "Huawei"
        } else if ua.contains("Xiaomi") || ua.contains("Redmi") {
            "Xiaomi"
        } else {
            "Android"
        };
    } else if ua.contains("Windows NT") {
        os = "Windows";
        brand = "PC";
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        os = "macOS";
        brand = "Apple";
    } else if ua.contains("Linux") {
        os = "Linux";
        brand = "PC";
    } else {
        os = "Unknown";
        brand = "Unknown";
    }

    // Order matters: Chromium-family agents also advertise Safari.
    let browser = if ua.contains("Edg/") || ua.contains("Edge/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Unknown"
    };

    let is_mobile = ua.contains("Mobile") || ua.contains("iPhone") || ua.contains("Android");

    ClientMeta {
        os: os.to_string(),
        browser: browser.to_string(),
        brand: brand.to_string(),
        is_mobile,
    }
}
