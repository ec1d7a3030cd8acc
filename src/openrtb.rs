//! OpenRTB 2.5 wire types.
//!
//! Outbound bid requests and inbound bid responses, trimmed to the fields
//! the simulator emits and consumes. Optional nested objects omit
//! themselves from the JSON when absent; `bidfloor` is always emitted,
//! even at zero.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use validator::{Validate, ValidationError, ValidationErrors};

/// Auction type codes (OpenRTB 2.5 §3.2.1, `at`).
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum AuctionType {
    FirstPrice = 1,
    SecondPrice = 2,
}

impl Default for AuctionType {
    fn default() -> Self {
        AuctionType::FirstPrice
    }
}

/// Device type codes (OpenRTB 2.5 table 5.21).
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum DeviceType {
    Mobile = 1,
    Pc = 2,
    Tv = 3,
    Phone = 4,
    Tablet = 5,
    Watch = 6,
}

/// Connection type codes (OpenRTB 2.5 table 5.22).
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum ConnectionType {
    Unknown = 0,
    Ethernet = 1,
    Wifi = 2,
    Cellular = 3,
    Cellular2G = 4,
    Cellular3G = 5,
    Cellular4G = 6,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct BidRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default)]
    pub at: AuctionType,
    pub tmax: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcat: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    // Always on the wire so bidders never have to guess the floor.
    pub bidfloor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,
}

impl Validate for Imp {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.id.trim().is_empty() {
            let mut error = ValidationError::new("required");
            error.message = Some("imp.id must be non-empty".into());
            errors.add("id", error);
        }

        if self.banner.is_none() && self.video.is_none() {
            let mut error = ValidationError::new("missing_media");
            error.message =
                Some("imp requires at least one creative object (banner/video)".into());
            errors.add("media", error);
        }

        if self.bidfloor < 0.0 {
            let mut error = ValidationError::new("negative_floor");
            error.message = Some("imp.bidfloor must be non-negative".into());
            errors.add("bidfloor", error);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Banner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btype: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battr: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<i64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct App {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storeurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<DeviceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectiontype: Option<ConnectionType>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Geo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yob: Option<i64>,
}

/// Inbound bid response. `seatbid` defaults to empty on deserialization so
/// an absent array and an empty array are indistinguishable downstream.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatBid {
    pub bid: Vec<Bid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adomain: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i64>,
}

impl BidResponse {
    /// A response with no bids in any seat is a no-bid. Absent `seatbid`
    /// and all-empty seat groups are the same thing.
    pub fn is_no_bid(&self) -> bool {
        self.seatbid.iter().all(|sb| sb.bid.is_empty())
    }

    /// All bids across all seats, in seat order then bid order.
    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.seatbid.iter().flat_map(|sb| sb.bid.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_request() -> BidRequest {
        BidRequest {
            id: "req-00000001".to_string(),
            imp: vec![Imp {
                id: "imp-1".to_string(),
                banner: Some(Banner {
                    w: Some(320),
                    h: Some(50),
                    ..Default::default()
                }),
                bidfloor: 0.5,
                secure: Some(1),
                ..Default::default()
            }],
            at: AuctionType::FirstPrice,
            tmax: 100,
            cur: Some(vec!["USD".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn request_roundtrips_through_json() {
        let req = minimal_request();
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: BidRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, "req-00000001");
        assert_eq!(decoded.imp.len(), 1);
        assert_eq!(decoded.at, AuctionType::FirstPrice);
        assert_eq!(decoded.tmax, 100);
    }

    #[test]
    fn request_omits_absent_objects() {
        let value = serde_json::to_value(minimal_request()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("app"));
        assert!(!obj.contains_key("site"));
        assert!(!obj.contains_key("device"));
        assert!(!obj.contains_key("user"));
        assert!(!obj.contains_key("bcat"));
        // wire names, not struct names
        assert_eq!(value["at"], json!(1));
        assert_eq!(value["imp"][0]["bidfloor"], json!(0.5));
    }

    #[test]
    fn bidfloor_is_emitted_even_at_zero() {
        let mut req = minimal_request();
        req.imp[0].bidfloor = 0.0;
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["imp"][0]["bidfloor"], json!(0.0));
    }

    #[test]
    fn integer_codes_serialize_as_numbers() {
        let device = Device {
            devicetype: Some(DeviceType::Phone),
            connectiontype: Some(ConnectionType::Wifi),
            ..Default::default()
        };
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["devicetype"], json!(4));
        assert_eq!(value["connectiontype"], json!(2));
    }

    #[test]
    fn request_validation_catches_bad_impressions() {
        let mut req = minimal_request();
        req.imp[0].banner = None;
        assert!(req.validate().is_err());

        let mut req = minimal_request();
        req.imp[0].bidfloor = -1.0;
        assert!(req.validate().is_err());

        assert!(minimal_request().validate().is_ok());
    }

    #[test]
    fn response_decodes_with_optional_fields_absent() {
        let decoded: BidResponse = serde_json::from_str(
            r#"{"id":"req-1","seatbid":[{"bid":[{"id":"b1","impid":"imp-1","price":2.5}]}]}"#,
        )
        .unwrap();
        assert_eq!(decoded.id, "req-1");
        assert_eq!(decoded.seatbid.len(), 1);
        let bid = &decoded.seatbid[0].bid[0];
        assert_eq!(bid.price, 2.5);
        assert!(bid.adm.is_none());
        assert!(bid.adomain.is_none());
    }

    #[test]
    fn no_bid_treats_absent_and_empty_seatbid_identically() {
        let absent: BidResponse = serde_json::from_str(r#"{"id":"req-1"}"#).unwrap();
        let empty: BidResponse = serde_json::from_str(r#"{"id":"req-1","seatbid":[]}"#).unwrap();
        let empty_seats: BidResponse =
            serde_json::from_str(r#"{"id":"req-1","seatbid":[{"bid":[]},{"bid":[]}]}"#).unwrap();
        assert!(absent.is_no_bid());
        assert!(empty.is_no_bid());
        assert!(empty_seats.is_no_bid());

        let with_bid: BidResponse = serde_json::from_str(
            r#"{"id":"req-1","seatbid":[{"bid":[]},{"bid":[{"id":"b","impid":"i","price":1.0}]}]}"#,
        )
        .unwrap();
        assert!(!with_bid.is_no_bid());
    }

    #[test]
    fn bids_flattens_across_seats_in_order() {
        let response: BidResponse = serde_json::from_str(
            r#"{"id":"req-1","seatbid":[
                {"seat":"a","bid":[{"id":"b1","impid":"i","price":1.0},{"id":"b2","impid":"i","price":2.0}]},
                {"seat":"b","bid":[{"id":"b3","impid":"i","price":3.0}]}
            ]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = response.bids().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
    }
}
