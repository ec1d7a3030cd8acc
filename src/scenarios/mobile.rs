//! Mobile in-app inventory scenario.
//!
//! Draws devices, apps and geo from fixed pools of plausible values so
//! the traffic looks like real mobile exchange flow without any live
//! data dependency.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::generator::Scenario;
use crate::openrtb::{
    App, AuctionType, Banner, BidRequest, ConnectionType, Device, DeviceType, Geo, Imp, User,
};

pub struct MobileApp {
    rng: Mutex<StdRng>,
}

impl MobileApp {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for MobileApp {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for MobileApp {
    fn name(&self) -> &str {
        "mobile_app"
    }

    fn generate(&self, request_id: String) -> BidRequest {
        let mut rng = self.rng.lock().expect("scenario rng poisoned");

        BidRequest {
            id: request_id,
            imp: vec![Imp {
                id: "imp-1".to_string(),
                banner: Some(random_banner(&mut rng)),
                bidfloor: random_bid_floor(&mut rng),
                secure: Some(1),
                ..Default::default()
            }],
            app: Some(random_app(&mut rng)),
            device: Some(random_device(&mut rng)),
            user: Some(User {
                id: Some(random_user_id(&mut rng)),
                ..Default::default()
            }),
            at: AuctionType::FirstPrice,
            tmax: 100,
            cur: Some(vec!["USD".to_string()]),
            ..Default::default()
        }
    }
}

fn random_banner(rng: &mut StdRng) -> Banner {
    let (w, h) = BANNER_SIZES[rng.gen_range(0..BANNER_SIZES.len())];
    Banner {
        w: Some(w),
        h: Some(h),
        // 0=unknown, 1=above fold, 2=below fold
        pos: Some(rng.gen_range(0..3)),
        ..Default::default()
    }
}

fn random_app(rng: &mut StdRng) -> App {
    let profile = &APPS[rng.gen_range(0..APPS.len())];
    App {
        id: Some(format!("app-{:06}", rng.gen_range(0..1_000_000))),
        name: Some(profile.name.to_string()),
        bundle: Some(profile.bundle.to_string()),
        cat: Some(vec![profile.category.to_string()]),
        ver: Some(format!(
            "{}.{}.{}",
            rng.gen_range(0..10),
            rng.gen_range(0..10),
            rng.gen_range(0..10)
        )),
        ..Default::default()
    }
}

fn random_device(rng: &mut StdRng) -> Device {
    let profile = &DEVICES[rng.gen_range(0..DEVICES.len())];
    Device {
        ua: Some(profile.ua.to_string()),
        ip: Some(random_ip(rng)),
        make: Some(profile.make.to_string()),
        model: Some(profile.model.to_string()),
        os: Some(profile.os.to_string()),
        osv: Some(profile.osv.to_string()),
        devicetype: Some(DeviceType::Phone),
        connectiontype: Some(random_connection_type(rng)),
        language: Some("en".to_string()),
        ifa: Some(Uuid::new_v4().to_string()),
        geo: Some(random_geo(rng)),
        ..Default::default()
    }
}

fn random_geo(rng: &mut StdRng) -> Geo {
    let point = &GEO_POINTS[rng.gen_range(0..GEO_POINTS.len())];
    // Jitter the coordinates so repeated requests don't pin one spot.
    Geo {
        lat: Some(point.lat + (rng.gen::<f64>() - 0.5) * 0.1),
        lon: Some(point.lon + (rng.gen::<f64>() - 0.5) * 0.1),
        country: Some(point.country.to_string()),
        region: Some(point.region.to_string()),
        city: Some(point.city.to_string()),
        ..Default::default()
    }
}

fn random_ip(rng: &mut StdRng) -> String {
    // Plausible public-looking addresses, avoiding 0 and broadcast octets.
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..224),
        rng.gen_range(0..256),
        rng.gen_range(0..256),
        rng.gen_range(1..255)
    )
}

fn random_user_id(rng: &mut StdRng) -> String {
    const CHARS: &[u8] = b"abcdef0123456789";
    (0..32)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

fn random_bid_floor(rng: &mut StdRng) -> f64 {
    // $0.25 - $3.00
    0.25 + rng.gen::<f64>() * 2.75
}

fn random_connection_type(rng: &mut StdRng) -> ConnectionType {
    const TYPES: [ConnectionType; 3] = [
        ConnectionType::Wifi,
        ConnectionType::Cellular4G,
        ConnectionType::Cellular3G,
    ];
    TYPES[rng.gen_range(0..TYPES.len())]
}

// Content pools

const BANNER_SIZES: [(i64, i64); 5] = [
    (320, 50),  // mobile leaderboard
    (300, 250), // medium rectangle
    (320, 480), // mobile interstitial
    (728, 90),  // leaderboard (tablet)
    (300, 50),  // mobile banner
];

struct AppProfile {
    name: &'static str,
    bundle: &'static str,
    category: &'static str,
}

const APPS: [AppProfile; 10] = [
    AppProfile {
        name: "Puzzle Quest",
        bundle: "com.games.puzzlequest",
        category: "IAB9-30",
    },
    AppProfile {
        name: "Daily News",
        bundle: "com.news.dailynews",
        category: "IAB12",
    },
    AppProfile {
        name: "Weather Pro",
        bundle: "com.weather.weatherpro",
        category: "IAB15",
    },
    AppProfile {
        name: "Fitness Tracker",
        bundle: "com.health.fitnesstracker",
        category: "IAB7",
    },
    AppProfile {
        name: "Social Chat",
        bundle: "com.social.chatapp",
        category: "IAB14",
    },
    AppProfile {
        name: "Music Stream",
        bundle: "com.music.streamapp",
        category: "IAB1",
    },
    AppProfile {
        name: "Photo Editor",
        bundle: "com.photo.editorpro",
        category: "IAB9",
    },
    AppProfile {
        name: "Recipe Book",
        bundle: "com.food.recipebook",
        category: "IAB8",
    },
    AppProfile {
        name: "Travel Guide",
        bundle: "com.travel.guidebook",
        category: "IAB20",
    },
    AppProfile {
        name: "Finance Manager",
        bundle: "com.finance.manager",
        category: "IAB13",
    },
];

struct DeviceProfile {
    make: &'static str,
    model: &'static str,
    os: &'static str,
    osv: &'static str,
    ua: &'static str,
}

const DEVICES: [DeviceProfile; 6] = [
    DeviceProfile {
        make: "Apple",
        model: "iPhone14,2",
        os: "iOS",
        osv: "16.0",
        ua: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
    },
    DeviceProfile {
        make: "Apple",
        model: "iPhone15,2",
        os: "iOS",
        osv: "17.0",
        ua: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    },
    DeviceProfile {
        make: "Samsung",
        model: "SM-G998B",
        os: "Android",
        osv: "13",
        ua: "Mozilla/5.0 (Linux; Android 13; SM-G998B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Mobile Safari/537.36",
    },
    DeviceProfile {
        make: "Samsung",
        model: "SM-S908B",
        os: "Android",
        osv: "14",
        ua: "Mozilla/5.0 (Linux; Android 14; SM-S908B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    },
    DeviceProfile {
        make: "Google",
        model: "Pixel 7",
        os: "Android",
        osv: "14",
        ua: "Mozilla/5.0 (Linux; Android 14; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    },
    DeviceProfile {
        make: "Xiaomi",
        model: "2201116SG",
        os: "Android",
        osv: "13",
        ua: "Mozilla/5.0 (Linux; Android 13; 2201116SG) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Mobile Safari/537.36",
    },
];

struct GeoPoint {
    lat: f64,
    lon: f64,
    country: &'static str,
    region: &'static str,
    city: &'static str,
}

const GEO_POINTS: [GeoPoint; 10] = [
    GeoPoint { lat: 37.7749, lon: -122.4194, country: "USA", region: "CA", city: "San Francisco" },
    GeoPoint { lat: 40.7128, lon: -74.0060, country: "USA", region: "NY", city: "New York" },
    GeoPoint { lat: 34.0522, lon: -118.2437, country: "USA", region: "CA", city: "Los Angeles" },
    GeoPoint { lat: 41.8781, lon: -87.6298, country: "USA", region: "IL", city: "Chicago" },
    GeoPoint { lat: 29.7604, lon: -95.3698, country: "USA", region: "TX", city: "Houston" },
    GeoPoint { lat: 33.4484, lon: -112.0740, country: "USA", region: "AZ", city: "Phoenix" },
    GeoPoint { lat: 39.7392, lon: -104.9903, country: "USA", region: "CO", city: "Denver" },
    GeoPoint { lat: 47.6062, lon: -122.3321, country: "USA", region: "WA", city: "Seattle" },
    GeoPoint { lat: 25.7617, lon: -80.1918, country: "USA", region: "FL", city: "Miami" },
    GeoPoint { lat: 42.3601, lon: -71.0589, country: "USA", region: "MA", city: "Boston" },
];
