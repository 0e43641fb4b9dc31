//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::core::{
    ColumnBuilder, DatabaseModel, DatabaseModelBuilder, DdlPolicy, DialectOptions, TableBuilder,
    TableModel, ValueKind,
};

/// `customer` (1) -> (n) `ord_order`, the order carrying an indexed
/// foreign key and comments on both levels.
pub(crate) fn shop_model(policy: DdlPolicy) -> DatabaseModel {
    DatabaseModelBuilder::new("shop")
        .ddl_policy(policy)
        .table(customer_table())
        .table(order_table())
        .build()
        .expect("valid shop model")
}

pub(crate) fn order_table() -> TableBuilder {
    TableBuilder::new("ord_order")
        .alias("o")
        .comment("Customer orders")
        .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
        .column(
            ColumnBuilder::new("customer_id", ValueKind::Long)
                .references("customer")
                .indexed(),
        )
        .column(
            ColumnBuilder::new("note", ValueKind::Text)
                .length(200)
                .comment("Free text"),
        )
}

pub(crate) fn customer_table() -> TableBuilder {
    TableBuilder::new("customer")
        .alias("c")
        .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
        .column(ColumnBuilder::new("name", ValueKind::Text).length(64).mandatory())
        .relation("orders", "ord_order", "customer_id")
}

/// A single `orders` table.
pub(crate) fn orders_model() -> DatabaseModel {
    DatabaseModelBuilder::new("orders_db")
        .table(
            TableBuilder::new("orders")
                .column(ColumnBuilder::new("id", ValueKind::Long).primary_key())
                .column(ColumnBuilder::new("note", ValueKind::Text).length(50)),
        )
        .build()
        .expect("valid orders model")
}

pub(crate) fn table<'a>(model: &'a DatabaseModel, name: &str) -> &'a Arc<TableModel> {
    model.table(name).expect("fixture table")
}

pub(crate) fn quoted() -> DialectOptions {
    DialectOptions {
        quote_identifiers: true,
        ..DialectOptions::default()
    }
}
