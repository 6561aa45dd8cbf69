use std::cmp::Ordering;
use std::collections::HashMap;

use crate::gateway::{read_records, Filter, Gateway, GatewayResult, Table};

use super::data::*;

pub const UNCATEGORIZED: &str = "Uncategorized";

impl FinanceSummary {
    pub fn from_transactions(
        transactions: &[Transaction],
        categories: &[TransactionCategory],
    ) -> FinanceSummary {
        let names: HashMap<&str, &str> = categories
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();

        let mut total_income = 0.0;
        let mut total_outgoing = 0.0;
        let mut spent: HashMap<Option<&str>, f64> = HashMap::new();

        for transaction in transactions {
            if transaction.amount >= 0.0 {
                total_income += transaction.amount;
            } else {
                let outgoing = -transaction.amount;
                total_outgoing += outgoing;
                // Unknown category ids count as uncategorized.
                let category = transaction
                    .transaction_category_id
                    .as_deref()
                    .filter(|id| names.contains_key(id));
                *spent.entry(category).or_default() += outgoing;
            }
        }

        let mut by_category: Vec<CategorySpending> = spent
            .into_iter()
            .map(|(category_id, amount)| CategorySpending {
                category_id: category_id.map(String::from),
                category: category_id
                    .and_then(|id| names.get(id).copied())
                    .unwrap_or(UNCATEGORIZED)
                    .to_string(),
                amount,
                percentage: amount / total_outgoing * 100.0,
            })
            .collect();
        by_category.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });

        FinanceSummary {
            total_income,
            total_outgoing,
            net: total_income - total_outgoing,
            by_category,
        }
    }
}

/// Everything the finances page shows for the session user.
pub async fn load_dashboard(gateway: &dyn Gateway) -> GatewayResult<FinanceDashboard> {
    let owned = Filter::new().eq("user_id", gateway.user_id()?);

    let accounts: Vec<FinancialAccount> = read_records(
        gateway,
        Table::FinancialAccounts,
        &owned.clone().order_asc("name"),
    )
    .await?;
    let transactions: Vec<Transaction> = read_records(
        gateway,
        Table::Transactions,
        &owned.clone().order_desc("transaction_date"),
    )
    .await?;
    let categories: Vec<TransactionCategory> =
        read_records(gateway, Table::TransactionCategories, &owned.order_asc("name")).await?;

    let summary = FinanceSummary::from_transactions(&transactions, &categories);
    Ok(FinanceDashboard {
        accounts,
        transactions,
        categories,
        summary,
    })
}
