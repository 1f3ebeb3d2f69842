//! Seeded in-memory catalogue shared by the unit tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::{
    Address, CartItem, Coupon, CouponType, Product, ProductSku, UserCoupon, UserCouponStatus,
};
use crate::store::memory::{MemoryState, MemoryStore};

/// Coupon definition valid for the next 30 days
pub fn coupon(coupon_type: CouponType, value: i64, min_amount: i64, max_discount: i64) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: Uuid::new_v4(),
        code: format!("C-{}", Uuid::new_v4().simple()),
        name: "Test coupon".into(),
        coupon_type,
        value,
        min_amount,
        max_discount,
        start_time: now - Duration::days(1),
        end_time: now + Duration::days(30),
        total_quantity: 100,
        used_quantity: 0,
        created_at: now - Duration::days(1),
    }
}

fn product(code: &str, name: &str, price: i64, stock: i32, on_sale: bool) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        code: code.into(),
        name: name.into(),
        image: Some(format!("https://img.example.com/{}.png", code)),
        price,
        stock,
        sales: 0,
        on_sale,
        created_at: now,
        updated_at: now,
    }
}

/// Unused instance of `coupon_id` held by `user_id`
pub fn user_coupon(user_id: Uuid, coupon_id: Uuid) -> UserCoupon {
    UserCoupon {
        id: Uuid::new_v4(),
        user_id,
        coupon_id,
        status: UserCouponStatus::Unused,
        order_id: None,
        used_at: None,
        created_at: Utc::now() - Duration::hours(1),
    }
}

fn cart_line(user_id: Uuid, product_id: Uuid, sku_id: Option<Uuid>, quantity: i32) -> CartItem {
    CartItem {
        id: Uuid::new_v4(),
        user_id,
        product_id,
        sku_id,
        quantity,
        created_at: Utc::now(),
    }
}

/// Catalogue:
/// - laptop: price 1000, stock 10
/// - tee: sold through SKU "Tee M" (price 300, stock 5)
/// - cable: price 50, stock 100
/// - retired: off sale
///
/// The user has a Shanghai address, cart lines for laptop, tee M and cable,
/// and unused instances of the flat, percentage, expired and exhausted
/// coupons.
pub struct Fixture {
    pub store: MemoryStore,
    pub user_id: Uuid,
    pub other_user_id: Uuid,
    pub address_id: Uuid,
    pub remote_address_id: Uuid,
    pub laptop_id: Uuid,
    pub tee_id: Uuid,
    pub tee_m_id: Uuid,
    pub cable_id: Uuid,
    pub retired_id: Uuid,
    pub flat_coupon_id: Uuid,
    pub flat_user_coupon_id: Uuid,
    pub percent_coupon_id: Uuid,
    pub expired_coupon_id: Uuid,
    pub exhausted_coupon_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        let user_id = Uuid::new_v4();
        let other_user_id = Uuid::new_v4();

        let laptop = product("LAPTOP", "Laptop", 1000, 10, true);
        let tee = product("TEE", "Tee", 300, 0, true);
        let cable = product("CABLE", "Cable", 50, 100, true);
        let retired = product("RETIRED", "Retired", 10, 100, false);

        let now = Utc::now();
        let tee_m = ProductSku {
            id: Uuid::new_v4(),
            product_id: tee.id,
            code: "TEE-M".into(),
            name: "Tee M".into(),
            specs: Some("Size: M".into()),
            image: None,
            price: 300,
            stock: 5,
            enabled: true,
            created_at: now,
            updated_at: now,
        };

        let address = Address {
            id: Uuid::new_v4(),
            user_id,
            receiver_name: "Ana".into(),
            receiver_phone: "555-0100".into(),
            region: "Shanghai".into(),
            city: "Shanghai".into(),
            district: "Pudong".into(),
            detail: "1 Century Ave".into(),
        };
        let remote_address = Address {
            id: Uuid::new_v4(),
            region: "Tibet".into(),
            city: "Lhasa".into(),
            ..address.clone()
        };

        let flat = coupon(CouponType::Flat, 500, 1000, 0);
        let percent = coupon(CouponType::Percentage, 90, 0, 0);
        let mut expired = coupon(CouponType::Flat, 100, 0, 0);
        expired.start_time = now - Duration::days(30);
        expired.end_time = now - Duration::days(1);
        let mut exhausted = coupon(CouponType::Flat, 100, 0, 0);
        exhausted.total_quantity = 1;
        exhausted.used_quantity = 1;

        let flat_instance = user_coupon(user_id, flat.id);
        let flat_user_coupon_id = flat_instance.id;
        for instance in [
            flat_instance,
            user_coupon(user_id, percent.id),
            user_coupon(user_id, expired.id),
            user_coupon(user_id, exhausted.id),
        ] {
            state.user_coupons.insert(instance.id, instance);
        }

        state.cart = vec![
            cart_line(user_id, laptop.id, None, 2),
            cart_line(user_id, tee.id, Some(tee_m.id), 1),
            cart_line(user_id, cable.id, None, 4),
            cart_line(other_user_id, laptop.id, None, 1),
        ];

        let fixture_ids = (
            laptop.id, tee.id, tee_m.id, cable.id, retired.id, flat.id, percent.id, expired.id,
            exhausted.id,
        );

        for p in [laptop, tee, cable, retired] {
            state.products.insert(p.id, p);
        }
        state.skus.insert(tee_m.id, tee_m);
        for c in [flat, percent, expired, exhausted] {
            state.coupons.insert(c.id, c);
        }

        let address_id = address.id;
        let remote_address_id = remote_address.id;
        state.addresses.insert(address.id, address);
        state.addresses.insert(remote_address.id, remote_address);

        let (
            laptop_id,
            tee_id,
            tee_m_id,
            cable_id,
            retired_id,
            flat_coupon_id,
            percent_coupon_id,
            expired_coupon_id,
            exhausted_coupon_id,
        ) = fixture_ids;

        Self {
            store: MemoryStore::new(state),
            user_id,
            other_user_id,
            address_id,
            remote_address_id,
            laptop_id,
            tee_id,
            tee_m_id,
            cable_id,
            retired_id,
            flat_coupon_id,
            flat_user_coupon_id,
            percent_coupon_id,
            expired_coupon_id,
            exhausted_coupon_id,
        }
    }
}
