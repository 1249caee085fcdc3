use anyhow::Context;
use marketbot_core::{extract_keywords, NewVendor, UserId};
use marketbot_db::{
    connect_with_settings, migrations, MarketplaceRepository, SqlMarketplaceRepository,
};

use crate::commands::{prepare, CommandResult};

/// Demo vendors use owner ids no real account will have.
const DEMO_OWNER_BASE: i64 = 9_000_000_001;

pub(crate) struct DemoVendor {
    pub business_name: &'static str,
    pub services: &'static str,
    pub contact: &'static str,
    pub bot_handle: Option<&'static str>,
    pub description: &'static str,
    pub price_range: &'static str,
}

pub(crate) const DEMO_VENDORS: &[DemoVendor] = &[
    DemoVendor {
        business_name: "Mama T Kitchen",
        services: "Jollof rice, fried rice, pasta, small chops",
        contact: "08012345678",
        bot_handle: Some("@MamaTKitchenBot"),
        description: "Hot meals delivered to your hostel in 30 minutes",
        price_range: "₦500 - ₦2000",
    },
    DemoVendor {
        business_name: "Fresh Fold Laundry",
        services: "Laundry washing, ironing, dry cleaning",
        contact: "@freshfold",
        bot_handle: None,
        description: "Same-day pickup and drop-off around campus",
        price_range: "₦300 per item",
    },
    DemoVendor {
        business_name: "PixelCraft Designs",
        services: "Logo design, flyers, video editing",
        contact: "08087654321",
        bot_handle: None,
        description: "Clean designs for clubs, events and small brands",
        price_range: "From ₦1500",
    },
];

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SeedSummary {
    pub inserted: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

impl SeedSummary {
    fn render(&self) -> String {
        let mut lines = vec![format!(
            "demo vendors: {} inserted, {} already present",
            self.inserted.len(),
            self.skipped.len()
        )];
        lines.extend(self.inserted.iter().map(|name| format!("  - inserted: {name}")));
        lines.extend(self.skipped.iter().map(|name| format!("  - skipped: {name}")));
        lines.join("\n")
    }
}

/// Inserts each demo vendor whose owner has no vendor yet.
pub(crate) async fn seed_demo_vendors(
    repository: &dyn MarketplaceRepository,
) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    for (offset, demo) in (0_i64..).zip(DEMO_VENDORS) {
        let owner = UserId(DEMO_OWNER_BASE + offset);
        let existing = repository
            .find_vendor_by_owner(owner)
            .await
            .with_context(|| format!("looking up demo owner {}", owner.0))?;
        if existing.is_some() {
            summary.skipped.push(demo.business_name);
            continue;
        }

        repository
            .insert_vendor(NewVendor {
                owner,
                business_name: demo.business_name.to_string(),
                services: demo.services.to_string(),
                keywords: extract_keywords(demo.services).join(),
                contact: demo.contact.to_string(),
                bot_handle: demo.bot_handle.map(str::to_string),
                description: demo.description.to_string(),
                price_range: demo.price_range.to_string(),
            })
            .await
            .with_context(|| format!("inserting demo vendor `{}`", demo.business_name))?;
        summary.inserted.push(demo.business_name);
    }
    Ok(summary)
}

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        // One connection so an in-memory database keeps its schema between statements.
        let pool = connect_with_settings(&config.database.url, 1, config.database.timeout_secs)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repository = SqlMarketplaceRepository::new(pool.clone());
        let seeded = seed_demo_vendors(&repository)
            .await
            .map_err(|error| ("seed_execution", format!("{error:#}"), 6u8));

        pool.close().await;
        seeded
    });

    match result {
        Ok(summary) => CommandResult::success("seed", summary.render()),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
