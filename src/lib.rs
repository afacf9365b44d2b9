//! Regional Devsim - policy-modified feasibility and subsidy allocation
//!
//! Each simulated year the pro forma's feasibility table is reshaped by
//! policy modifiers, development fees flow into budget accounts, and the
//! subsidy allocators spend those accounts on projects the market will not
//! build unaided.

pub mod accounts;
pub mod allocation;
pub mod core;
pub mod expression;
pub mod feasibility;
pub mod policy;
pub mod revenue;
pub mod rules;
pub mod simulation;
