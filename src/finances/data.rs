use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FinancialAccount {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub account_type: String,
    pub provider_name: Option<String>,
    pub currency_code: Option<String>,
    pub current_balance: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

/// Positive amounts are income, negative amounts are outgoing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub financial_account_id: String,
    pub amount: f64,
    pub currency_code: String,
    pub description: String,
    pub transaction_date: String,
    pub transaction_category_id: Option<String>,
    pub merchant_name: Option<String>,
    pub status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransactionCategory {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub transaction_type: String,
    pub color_hex: Option<String>,
    pub icon_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CategorySpending {
    pub category_id: Option<String>,
    pub category: String,
    pub amount: f64,
    /// Share of total outgoing, 0 to 100.
    pub percentage: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FinanceSummary {
    pub total_income: f64,
    /// Reported as a positive number.
    pub total_outgoing: f64,
    pub net: f64,
    /// Largest spend first.
    pub by_category: Vec<CategorySpending>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FinanceDashboard {
    pub accounts: Vec<FinancialAccount>,
    pub transactions: Vec<Transaction>,
    pub categories: Vec<TransactionCategory>,
    pub summary: FinanceSummary,
}
