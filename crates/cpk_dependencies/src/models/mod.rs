// SPDX-License-Identifier: Apache-2.0

pub mod certificate;
pub mod constraint;
pub mod dependency;
pub mod signers;
