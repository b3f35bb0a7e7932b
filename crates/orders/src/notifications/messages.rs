//! Notification text in Spanish and English.
//!
//! Customer copies are rendered in the record's language. Business copies are
//! always rendered in Spanish.

use std::fmt::Write as _;

use panaderia_core::{Language, PaymentType};
use rust_decimal::Decimal;

use super::{Event, Notice, RecipientKind};

/// Rendered subject and plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

/// Render a notification for one kind of recipient.
#[must_use]
pub fn render(event: Event, kind: RecipientKind, language: Language, notice: Notice<'_>) -> Rendered {
    let language = match kind {
        RecipientKind::Customer => language,
        RecipientKind::Business => Language::Es,
    };
    let reference = reference(notice);
    let subject = format!("{} · {reference}", headline(event, kind, language));

    let mut body = String::new();
    let _ = writeln!(body, "{}", greeting(kind, language, notice.customer_name()));
    let _ = writeln!(body);
    let _ = writeln!(body, "{}", lead(event, kind, language));
    let _ = writeln!(body);
    match notice {
        Notice::Order(order) => {
            let _ = writeln!(body, "{} {reference}", label(Label::Order, language));
            for item in &order.items {
                let _ = writeln!(
                    body,
                    "- {} x {} ({})",
                    item.quantity,
                    item.name,
                    item.display_price()
                );
            }
            let _ = writeln!(body, "{}: {}", label(Label::Subtotal, language), money(order.subtotal));
            if !order.tax.is_zero() {
                let _ = writeln!(body, "{}: {}", label(Label::Tax, language), money(order.tax));
            }
            let _ = writeln!(body, "{}: {}", label(Label::Total, language), money(order.total));
            if order.payment_type == PaymentType::Zelle
                && let Some(payment_reference) = &order.payment_reference
            {
                let _ = writeln!(
                    body,
                    "{}: {payment_reference}",
                    label(Label::TransferReference, language)
                );
            }
            let metadata = order.metadata();
            let pickup_date = order
                .pickup_date
                .map(|d| d.to_string())
                .or(metadata.pickup_date);
            let pickup_time = order.pickup_time.clone().or(metadata.pickup_time);
            if let Some(date) = pickup_date {
                let when = pickup_time.map_or(date.clone(), |t| format!("{date} {t}"));
                let _ = writeln!(body, "{}: {when}", label(Label::Pickup, language));
            }
        }
        Notice::Quote(quote) => {
            let _ = writeln!(body, "{} {reference}", label(Label::Quote, language));
            if let Some(occasion) = &quote.occasion {
                let _ = writeln!(body, "{}: {occasion}", label(Label::Occasion, language));
            }
            if let Some(servings) = quote.servings {
                let _ = writeln!(body, "{}: {servings}", label(Label::Servings, language));
            }
            if let Some(description) = &quote.description {
                let _ = writeln!(body, "{description}");
            }
            if let Some(price) = quote.estimated_price {
                let _ = writeln!(body, "{}: {}", label(Label::Estimate, language), money(price));
            }
            if let Some(notes) = &quote.admin_notes {
                let _ = writeln!(body, "{notes}");
            }
        }
    }

    Rendered {
        subject,
        body: body.trim_end().to_string(),
    }
}

/// Positional parameters for a chat template: name, reference, amount.
#[must_use]
pub fn template_params(notice: Notice<'_>) -> Vec<String> {
    let amount = match notice {
        Notice::Order(order) => money(order.total),
        Notice::Quote(quote) => quote.estimated_price.map(money).unwrap_or_default(),
    };
    vec![notice.customer_name().to_string(), reference(notice), amount]
}

fn reference(notice: Notice<'_>) -> String {
    match notice {
        Notice::Order(order) => format!("#{}", order.id),
        Notice::Quote(quote) => quote.reference_code(),
    }
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

fn greeting(kind: RecipientKind, language: Language, name: &str) -> String {
    match (kind, language) {
        (RecipientKind::Business, _) => "Hola equipo,".to_string(),
        (RecipientKind::Customer, Language::Es) => format!("Hola {name},"),
        (RecipientKind::Customer, Language::En) => format!("Hi {name},"),
    }
}

fn headline(event: Event, kind: RecipientKind, language: Language) -> &'static str {
    use Event as E;
    use Language::{En, Es};
    use RecipientKind::{Business, Customer};

    match (event, kind, language) {
        (E::OrderReceived, Customer, Es) => "Recibimos tu pedido",
        (E::OrderReceived, Customer, En) => "We received your order",
        (E::OrderReceived, Business, _) => "Nuevo pedido",
        (E::QuoteSubmitted, Customer, Es) => "Recibimos tu solicitud de cotización",
        (E::QuoteSubmitted, Customer, En) => "We received your quote request",
        (E::QuoteSubmitted, Business, _) => "Nueva solicitud de cotización",
        (E::QuoteResponded, Customer, Es) => "Tu cotización está lista",
        (E::QuoteResponded, Customer, En) => "Your quote is ready",
        (E::QuoteResponded, Business, _) => "Cotización respondida",
        (E::PaymentReady, Customer, Es) => "Tu pedido está listo para pagar",
        (E::PaymentReady, Customer, En) => "Your order is ready for payment",
        (E::PaymentReady, Business, _) => "Pedido listo para pago",
        (E::PaymentSubmitted, Customer, Es) => "Recibimos tu aviso de pago",
        (E::PaymentSubmitted, Customer, En) => "We received your payment notice",
        (E::PaymentSubmitted, Business, _) => "Transferencia por confirmar",
        (E::PaymentConfirmed, Customer, Es) => "Pago confirmado",
        (E::PaymentConfirmed, Customer, En) => "Payment confirmed",
        (E::PaymentConfirmed, Business, _) => "Pago confirmado",
        (E::ReadyForPickup, Customer, Es) => "Tu pedido está listo para recoger",
        (E::ReadyForPickup, Customer, En) => "Your order is ready for pickup",
        (E::ReadyForPickup, Business, _) => "Pedido listo para recoger",
    }
}

fn lead(event: Event, kind: RecipientKind, language: Language) -> &'static str {
    use Event as E;
    use Language::{En, Es};
    use RecipientKind::{Business, Customer};

    match (event, kind, language) {
        (E::OrderReceived, Customer, Es) => "Gracias por tu compra. Ya estamos preparando tu pedido.",
        (E::OrderReceived, Customer, En) => "Thank you for your purchase. We are preparing your order.",
        (E::QuoteSubmitted, Customer, Es) => {
            "Revisaremos tu solicitud y te enviaremos un precio estimado pronto."
        }
        (E::QuoteSubmitted, Customer, En) => {
            "We will review your request and send you an estimate soon."
        }
        (E::QuoteResponded, Customer, Es) => "Revisamos tu solicitud. Estos son los detalles:",
        (E::QuoteResponded, Customer, En) => "We reviewed your request. Here are the details:",
        (E::PaymentReady, Customer, Es) => "Tu pedido fue creado y puedes completar el pago.",
        (E::PaymentReady, Customer, En) => "Your order was created and is ready for payment.",
        (E::PaymentSubmitted, Customer, Es) => {
            "Confirmaremos tu transferencia en cuanto la recibamos."
        }
        (E::PaymentSubmitted, Customer, En) => {
            "We will confirm your transfer as soon as it arrives."
        }
        (E::PaymentConfirmed, Customer, Es) => "Recibimos tu pago. ¡Gracias!",
        (E::PaymentConfirmed, Customer, En) => "We received your payment. Thank you!",
        (E::ReadyForPickup, Customer, Es) => "Ya puedes pasar a recoger tu pedido.",
        (E::ReadyForPickup, Customer, En) => "Your order is ready to be picked up.",
        (E::PaymentSubmitted, Business, _) => {
            "Un cliente avisó que pagó por transferencia. Confirma la recepción del dinero."
        }
        (_, Business, _) => "Detalles:",
    }
}

#[derive(Clone, Copy)]
enum Label {
    Order,
    Quote,
    Subtotal,
    Tax,
    Total,
    TransferReference,
    Pickup,
    Occasion,
    Servings,
    Estimate,
}

const fn label(label: Label, language: Language) -> &'static str {
    match (label, language) {
        (Label::Order, Language::Es) => "Pedido",
        (Label::Order, Language::En) => "Order",
        (Label::Quote, Language::Es) => "Cotización",
        (Label::Quote, Language::En) => "Quote",
        (Label::Subtotal, _) => "Subtotal",
        (Label::Tax, Language::Es) => "Impuesto",
        (Label::Tax, Language::En) => "Tax",
        (Label::Total, _) => "Total",
        (Label::TransferReference, Language::Es) => "Referencia de transferencia",
        (Label::TransferReference, Language::En) => "Transfer reference",
        (Label::Pickup, Language::Es) => "Recogida",
        (Label::Pickup, Language::En) => "Pickup",
        (Label::Occasion, Language::Es) => "Ocasión",
        (Label::Occasion, Language::En) => "Occasion",
        (Label::Servings, Language::Es) => "Porciones",
        (Label::Servings, Language::En) => "Servings",
        (Label::Estimate, Language::Es) => "Precio estimado",
        (Label::Estimate, Language::En) => "Estimated price",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;
    use crate::db::models::tests::sample_order;

    #[test]
    fn test_customer_copy_follows_language() {
        let mut order = sample_order();
        order.language = Language::En;
        let rendered = render(
            Event::OrderReceived,
            RecipientKind::Customer,
            Language::En,
            Notice::Order(&order),
        );
        assert!(rendered.subject.starts_with("We received your order"));
        assert!(rendered.body.contains(&format!("Order #{}", order.id)));
        assert!(rendered.body.contains("Total:"));
    }

    #[test]
    fn test_business_copy_is_spanish() {
        let order = sample_order();
        let rendered = render(
            Event::PaymentSubmitted,
            RecipientKind::Business,
            Language::En,
            Notice::Order(&order),
        );
        assert!(rendered.subject.starts_with("Transferencia por confirmar"));
        assert!(rendered.body.starts_with("Hola equipo,"));
    }

    #[test]
    fn test_money_format() {
        assert_eq!(money(dec!(85)), "$85.00");
        assert_eq!(money(dec!(0.825)), "$0.82");
    }
}
