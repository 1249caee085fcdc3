//! Conversion of a finished flow's collected fields into insertable records.

use std::collections::BTreeMap;

use crate::domain::order::{NewOrder, OrderId};
use crate::domain::rating::{NewRating, Stars};
use crate::domain::user::UserId;
use crate::domain::vendor::{NewVendor, VendorId};
use crate::flows::engine::FlowTransitionError;
use crate::flows::states::{fields, ActiveFlow, FlowKind};

struct FieldReader<'a> {
    kind: FlowKind,
    fields: &'a BTreeMap<String, String>,
    missing: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(flow: &'a ActiveFlow, expected: FlowKind) -> Result<Self, FlowTransitionError> {
        if flow.kind != expected {
            return Err(FlowTransitionError::KindMismatch { expected, actual: flow.kind });
        }
        Ok(Self { kind: flow.kind, fields: &flow.fields, missing: Vec::new() })
    }

    fn required(&mut self, name: &'static str) -> String {
        match self.fields.get(name) {
            Some(value) => value.clone(),
            None => {
                self.missing.push(name.to_owned());
                String::new()
            }
        }
    }

    fn optional(&self, name: &'static str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    fn id(&mut self, name: &'static str) -> Result<i64, FlowTransitionError> {
        let Some(raw) = self.fields.get(name) else {
            self.missing.push(name.to_owned());
            return Ok(0);
        };
        raw.parse::<i64>()
            .map_err(|_| FlowTransitionError::MalformedField { field: name, value: raw.clone() })
    }

    fn ensure_complete(&self) -> Result<(), FlowTransitionError> {
        if self.missing.is_empty() {
            return Ok(());
        }
        Err(FlowTransitionError::MissingRequiredFields {
            kind: self.kind,
            missing_fields: self.missing.clone(),
        })
    }
}

pub fn vendor_draft(owner: UserId, flow: &ActiveFlow) -> Result<NewVendor, FlowTransitionError> {
    let mut reader = FieldReader::new(flow, FlowKind::Registration)?;
    let vendor = NewVendor {
        owner,
        business_name: reader.required(fields::BUSINESS_NAME),
        services: reader.required(fields::SERVICES),
        keywords: reader.required(fields::KEYWORDS),
        contact: reader.required(fields::CONTACT),
        bot_handle: reader.optional(fields::BOT_HANDLE),
        description: reader.required(fields::DESCRIPTION),
        price_range: reader.required(fields::PRICE_RANGE),
    };
    reader.ensure_complete()?;
    Ok(vendor)
}

pub fn order_draft(buyer: UserId, flow: &ActiveFlow) -> Result<NewOrder, FlowTransitionError> {
    let mut reader = FieldReader::new(flow, FlowKind::OrderPlacement)?;
    let order = NewOrder {
        vendor_id: VendorId(reader.id(fields::VENDOR_ID)?),
        buyer_id: buyer,
        details: reader.required(fields::ORDER_DETAILS),
        deadline: reader.required(fields::DEADLINE),
    };
    reader.ensure_complete()?;
    Ok(order)
}

pub fn rating_draft(buyer: UserId, flow: &ActiveFlow) -> Result<NewRating, FlowTransitionError> {
    let mut reader = FieldReader::new(flow, FlowKind::Rating)?;
    let order_id = OrderId(reader.id(fields::ORDER_ID)?);
    let vendor_id = VendorId(reader.id(fields::VENDOR_ID)?);
    let raw_stars = reader.required(fields::STARS);
    let review = reader.optional(fields::REVIEW);

    reader.ensure_complete()?;

    let stars = raw_stars
        .parse::<u8>()
        .ok()
        .and_then(|value| Stars::new(value).ok())
        .ok_or(FlowTransitionError::MalformedField { field: fields::STARS, value: raw_stars })?;

    Ok(NewRating { order_id, vendor_id, buyer_id: buyer, stars, review })
}

#[cfg(test)]
mod tests {
    use super::{order_draft, rating_draft, vendor_draft};
    use crate::domain::{user::UserId, vendor::VendorId};
    use crate::flows::engine::FlowTransitionError;
    use crate::flows::states::{fields, ActiveFlow, FlowKind};

    #[test]
    fn vendor_draft_reports_every_missing_field() {
        let flow = ActiveFlow::seeded(FlowKind::Registration, [(fields::BUSINESS_NAME, "Spot")]);
        let error = vendor_draft(UserId(1), &flow).expect_err("incomplete registration");

        let FlowTransitionError::MissingRequiredFields { kind, missing_fields } = error else {
            panic!("expected missing fields, got {error:?}");
        };
        assert_eq!(kind, FlowKind::Registration);
        assert!(missing_fields.contains(&fields::SERVICES.to_owned()));
        assert!(!missing_fields.contains(&fields::BOT_HANDLE.to_owned()));
    }

    #[test]
    fn order_draft_parses_seeded_vendor() {
        let flow = ActiveFlow::seeded(
            FlowKind::OrderPlacement,
            [(fields::VENDOR_ID, "12"), (fields::ORDER_DETAILS, "cake"), (fields::DEADLINE, "Sun")],
        );
        let order = order_draft(UserId(5), &flow).expect("complete order");
        assert_eq!(order.vendor_id, VendorId(12));
        assert_eq!(order.buyer_id, UserId(5));
    }

    #[test]
    fn rating_draft_rejects_malformed_ids_and_stars() {
        let flow = ActiveFlow::seeded(
            FlowKind::Rating,
            [(fields::ORDER_ID, "x"), (fields::VENDOR_ID, "1"), (fields::STARS, "4")],
        );
        assert!(matches!(
            rating_draft(UserId(5), &flow),
            Err(FlowTransitionError::MalformedField { field: fields::ORDER_ID, .. })
        ));

        let flow = ActiveFlow::seeded(
            FlowKind::Rating,
            [(fields::ORDER_ID, "2"), (fields::VENDOR_ID, "1"), (fields::STARS, "9")],
        );
        assert!(matches!(
            rating_draft(UserId(5), &flow),
            Err(FlowTransitionError::MalformedField { field: fields::STARS, .. })
        ));
    }

    #[test]
    fn rating_draft_keeps_absent_review() {
        let flow = ActiveFlow::seeded(
            FlowKind::Rating,
            [(fields::ORDER_ID, "2"), (fields::VENDOR_ID, "1"), (fields::STARS, "4")],
        );
        let rating = rating_draft(UserId(5), &flow).expect("complete rating");
        assert_eq!(rating.stars.get(), 4);
        assert_eq!(rating.review, None);
    }
}
