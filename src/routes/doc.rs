use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        address::{PutAddressRequest, PutAddressResponse, SavedAddressResponse},
        categories::{CategoryList, CreateCategoryRequest},
        orders::{
            CheckoutItemInput, CheckoutRequest, OrderList, OrdersPayload, PlaceOrderResponse,
            PlacedOrderSummary, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest},
    },
    models::{
        Category, CheckoutAddress, Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod,
        PaymentStatus, Product, ProductView, StockViolation,
    },
    purchase_mode::PurchaseMode,
    response::{ApiResponse, Meta},
    routes::{admin, categories, health, orders, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        categories::list_categories,
        categories::create_category,
        orders::list_orders,
        orders::place_order,
        users::get_address,
        users::put_address,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            Category,
            Product,
            ProductView,
            PurchaseMode,
            CheckoutAddress,
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            PaymentStatus,
            OrderWithItems,
            StockViolation,
            CheckoutItemInput,
            CheckoutRequest,
            PlacedOrderSummary,
            PlaceOrderResponse,
            OrderList,
            OrdersPayload,
            UpdateOrderStatusRequest,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            ProductList,
            CreateCategoryRequest,
            CategoryList,
            SavedAddressResponse,
            PutAddressRequest,
            PutAddressResponse,
            Meta,
            ApiResponse<ProductView>,
            ApiResponse<ProductList>,
            ApiResponse<OrdersPayload>,
            ApiResponse<PlaceOrderResponse>,
            ApiResponse<SavedAddressResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog browsing and product management"),
        (name = "Categories", description = "Product categories"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Users", description = "Saved checkout address"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
